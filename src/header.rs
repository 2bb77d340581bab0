use crate::model::Scalar;

fn looks_like_label(value: &Scalar) -> bool {
    value
        .as_text()
        .is_some_and(|text| !text.is_empty() && !text.chars().any(char::is_numeric))
}

/// A first row is a header when more than half of its cells are non-empty
/// text without any digits.
#[must_use]
pub fn has_header(first_row: &[Scalar]) -> bool {
    if first_row.is_empty() {
        return false;
    }

    let labels = first_row.iter().filter(|value| looks_like_label(value)).count();
    labels * 2 > first_row.len()
}
