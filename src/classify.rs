use std::sync::LazyLock;

use regex::Regex;

use crate::model::{CellFormatting, DataType, Scalar};

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

static LEADING_CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[$€£¥]\s*\d").expect("hardcoded leading currency regex is valid")
});
static TRAILING_CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d\s*[$€£¥]$").expect("hardcoded trailing currency regex is valid")
});
static DATE_RES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        r"^\d{1,2}/\d{1,2}/\d{2,4}",
        r"^\d{1,2}-\d{1,2}-\d{2,4}",
        r"^\d{4}-\d{1,2}-\d{1,2}",
        r"(?i)^\d{1,2}\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\s+\d{2,4}",
    ]
    .map(|pattern| Regex::new(pattern).expect("hardcoded date regex is valid"))
});

fn is_currency(value: &str) -> bool {
    LEADING_CURRENCY_RE.is_match(value) || TRAILING_CURRENCY_RE.is_match(value)
}

fn is_date(value: &str) -> bool {
    DATE_RES.iter().any(|re| re.is_match(value))
}

fn is_number(value: &str) -> bool {
    let cleaned = value.replace([',', ' '], "");
    cleaned.parse::<f64>().is_ok()
}

/// Category of a single non-empty value, tested in priority order.
#[must_use]
pub fn classify_value(value: &str) -> Option<DataType> {
    let value = value.trim();
    if is_currency(value) {
        Some(DataType::Currency)
    } else if value.contains('%') {
        Some(DataType::Percentage)
    } else if is_date(value) {
        Some(DataType::Date)
    } else if is_number(value) {
        Some(DataType::Number)
    } else {
        None
    }
}

/// Infers the data type of a column. A category wins when it covers more
/// than half of the non-empty values.
pub fn classify<'a, I>(values: I) -> DataType
where
    I: IntoIterator<Item = &'a Scalar>,
{
    let mut total = 0_usize;
    let mut currency = 0_usize;
    let mut percentage = 0_usize;
    let mut date = 0_usize;
    let mut number = 0_usize;

    for value in values.into_iter().filter(|value| !value.is_empty()) {
        total += 1;
        match classify_value(&value.to_string()) {
            Some(DataType::Currency) => currency += 1,
            Some(DataType::Percentage) => percentage += 1,
            Some(DataType::Date) => date += 1,
            Some(DataType::Number) => number += 1,
            _ => {}
        }
    }

    if total == 0 {
        return DataType::String;
    }

    [
        (currency, DataType::Currency),
        (percentage, DataType::Percentage),
        (date, DataType::Date),
        (number, DataType::Number),
    ]
    .into_iter()
    .find(|(count, _)| count * 2 > total)
    .map_or(DataType::String, |(_, data_type)| data_type)
}

/// Rendering hints for one value of a column typed `data_type`.
#[must_use]
pub fn formatting_hints(value: &Scalar, data_type: DataType) -> CellFormatting {
    if !matches!(
        data_type,
        DataType::Number | DataType::Currency | DataType::Percentage
    ) || value.is_empty()
    {
        return CellFormatting::default();
    }

    let text = value.to_string();
    let text = text.trim();
    let decimal_places = text.rsplit_once('.').map(|(_, fraction)| {
        fraction
            .chars()
            .take_while(char::is_ascii_digit)
            .count()
    });
    let currency_symbol = if data_type == DataType::Currency {
        text.chars().find(|ch| CURRENCY_SYMBOLS.contains(ch))
    } else {
        None
    };

    CellFormatting {
        decimal_places,
        currency_symbol,
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, classify_value, formatting_hints};
    use crate::model::{CellFormatting, DataType, Scalar};

    fn column(values: &[&str]) -> Vec<Scalar> {
        values.iter().map(|value| Scalar::from(*value)).collect()
    }

    #[test]
    fn classifies_numeric_columns() {
        assert_eq!(classify(&column(&["10", "20", "30.5"])), DataType::Number);
        assert_eq!(classify(&column(&["1,200", "3 400", "-7"])), DataType::Number);
    }

    #[test]
    fn classifies_currency_percentage_and_date_columns() {
        assert_eq!(classify(&column(&["$10", "$20"])), DataType::Currency);
        assert_eq!(classify(&column(&["10 €", "3£"])), DataType::Currency);
        assert_eq!(classify(&column(&["5%", "10%"])), DataType::Percentage);
        assert_eq!(
            classify(&column(&["01/02/2020", "03/04/2021"])),
            DataType::Date
        );
        assert_eq!(
            classify(&column(&["2021-3-14", "4 MARCH 2020", "12 jan 99"])),
            DataType::Date
        );
        assert_eq!(
            classify(&column(&["14-03-2021", "3-4-21"])),
            DataType::Date
        );
        assert_eq!(classify(&column(&["5 EUR", "12 USD"])), DataType::String);
    }

    #[test]
    fn empty_columns_are_strings() {
        assert_eq!(classify(&column(&[])), DataType::String);
        assert_eq!(classify(&column(&["", ""])), DataType::String);
        assert_eq!(classify(&[Scalar::Null]), DataType::String);
    }

    #[test]
    fn majority_category_wins() {
        let mixed = column(&["$1", "$2", "$3", "4", "5"]);
        assert_eq!(classify(&mixed), DataType::Currency);

        let split = column(&["$1", "$2", "3", "4"]);
        assert_eq!(classify(&split), DataType::String);
    }

    #[test]
    fn empty_values_do_not_count_towards_the_total() {
        let sparse = column(&["12", "", "14", ""]);
        assert_eq!(classify(&sparse), DataType::Number);
    }

    #[test]
    fn currency_takes_priority_over_percentage() {
        assert_eq!(classify_value("$5%"), Some(DataType::Currency));
        assert_eq!(classify_value("abc"), None);
    }

    #[test]
    fn derives_formatting_hints() {
        assert_eq!(
            formatting_hints(&Scalar::from("£1,234.50"), DataType::Currency),
            CellFormatting {
                decimal_places: Some(2),
                currency_symbol: Some('£'),
            }
        );
        assert_eq!(
            formatting_hints(&Scalar::from("12"), DataType::Number),
            CellFormatting::default()
        );
        assert_eq!(
            formatting_hints(&Scalar::from("1.5"), DataType::String),
            CellFormatting::default()
        );
    }
}
