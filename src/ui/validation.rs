/// True when the value is present and has something besides whitespace
pub fn is_valid_string(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}
