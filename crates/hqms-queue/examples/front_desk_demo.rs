//! 门诊排队演示程序
//!
//! 展示挂号、急诊插队、叫号、结束就诊和号码查询的完整流程

use hqms_core::{Department, Doctor, Gender, HqmsError, PatientDetails, Priority, RegistrationRequest};
use hqms_queue::{MemoryTokenStore, QueueManager, QueueSettings, StaticDirectory};
use std::sync::Arc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    println!("🏥 门诊排队叫号演示\n");

    // 1. 设置科室和医生
    let (department, doctor) = setup_directory();
    let directory = Arc::new(StaticDirectory::new(vec![department.clone()], vec![doctor.clone()]));
    let manager = QueueManager::new(
        Arc::new(MemoryTokenStore::new()),
        directory,
        QueueSettings::default(),
    );
    println!("✅ 科室 {} / 医生 {} 设置完成", department.name, doctor.name);

    // 2. 前台挂号
    let patients = [
        ("王芳", Gender::Female, 29, Priority::Normal),
        ("李强", Gender::Male, 45, Priority::Normal),
        ("赵敏", Gender::Female, 67, Priority::Emergency),
    ];
    for (i, (name, gender, age, priority)) in patients.iter().enumerate() {
        let view = manager
            .register_token(RegistrationRequest {
                patient: PatientDetails {
                    patient_name: name.to_string(),
                    patient_phone: format!("1380000000{}", i),
                    patient_age: *age,
                    patient_gender: *gender,
                },
                problem: "门诊就诊".to_string(),
                department_id: department.id,
                doctor_id: doctor.id,
                priority: *priority,
            })
            .await?;

        println!(
            "📋 {} 挂号成功: #{} ({:?}), 预计等待 {} 分钟",
            name,
            view.token.token_number,
            view.token.priority,
            view.estimated_wait_minutes.unwrap_or(0)
        );
    }

    // 3. 显示候诊列表
    println!("\n👨‍⚕️ 医生 {} 的候诊列表:", doctor.name);
    for view in manager.get_queue_view(doctor.id).await? {
        println!(
            "   {}. #{} {} ({:?}) ~{} 分钟",
            view.queue_position.unwrap_or(0) + 1,
            view.token.token_number,
            view.token.patient.patient_name,
            view.token.priority,
            view.estimated_wait_minutes.unwrap_or(0)
        );
    }

    // 4. 叫号并结束就诊
    let current = manager.call_next(doctor.id).await?;
    println!("\n📢 请 #{} {} 就诊", current.token_number, current.patient.patient_name);

    match manager.call_next(doctor.id).await {
        Err(HqmsError::DoctorBusy { .. }) => println!("⚠️  医生正在接诊，不能重复叫号"),
        other => println!("意外结果: {:?}", other),
    }

    manager.complete_token(current.id).await?;
    println!("✅ #{} 就诊结束", current.token_number);

    // 5. 患者查询号码
    let tracked = manager.track_token(2).await?;
    println!(
        "\n🔎 #2 状态: {:?}, 前面还有 {} 人, 预计等待 {} 分钟",
        tracked.token.status,
        tracked.queue_position.unwrap_or(0),
        tracked.estimated_wait_minutes.unwrap_or(0)
    );

    // 6. 队列统计
    let stats = manager.queue_stats(doctor.id).await?;
    println!(
        "\n📊 候诊 {} 人 (急诊 {}), 已完成 {} 人",
        stats.waiting, stats.emergency_waiting, stats.completed
    );

    println!("\n🎉 演示完成!");
    Ok(())
}

/// 设置科室和医生
fn setup_directory() -> (Department, Doctor) {
    let department = Department {
        id: Uuid::new_v4(),
        name: "内科".to_string(),
        description: Some("普通内科门诊".to_string()),
    };
    let doctor = Doctor {
        id: Uuid::new_v4(),
        name: "张医生".to_string(),
        specialization: "心血管内科".to_string(),
        department_id: department.id,
        available: true,
        average_consultation_minutes: Some(12),
    };
    (department, doctor)
}
