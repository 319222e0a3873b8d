//! 通用工具函数

/// 患者年龄上限
pub const MAX_PATIENT_AGE: u16 = 150;

/// 规范化电话号码
///
/// 去掉空格、横线、括号和开头的 `+`，剩余部分必须为 7 到 15 位数字。
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let mut digits = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '(' | ')' => {}
            _ => return None,
        }
    }

    if (7..=15).contains(&digits.len()) {
        Some(digits)
    } else {
        None
    }
}

/// 验证患者年龄
pub fn is_valid_patient_age(age: u16) -> bool {
    age <= MAX_PATIENT_AGE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+91 98765-43210"), Some("919876543210".to_string()));
        assert_eq!(normalize_phone("(020) 555 0101"), Some("0205550101".to_string()));
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("98765abc10"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn test_is_valid_patient_age() {
        assert!(is_valid_patient_age(0));
        assert!(is_valid_patient_age(150));
        assert!(!is_valid_patient_age(151));
    }
}
