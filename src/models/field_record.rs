use serde::ser::{Serialize, SerializeMap, Serializer};

/// Marker for a field the model could not find.
pub const UNKNOWN: &str = "N/A";

pub const FIELD_COUNT: usize = 9;

/// The nine extracted fields, in the order the model returns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    BankName,
    CustomerName,
    Iban,
    AccountNumber,
    PhoneNumber,
    Salary,
    StatementBalance,
    HighestDebited,
    HighestCredited,
}

impl FieldKey {
    pub const ALL: [FieldKey; FIELD_COUNT] = [
        FieldKey::BankName,
        FieldKey::CustomerName,
        FieldKey::Iban,
        FieldKey::AccountNumber,
        FieldKey::PhoneNumber,
        FieldKey::Salary,
        FieldKey::StatementBalance,
        FieldKey::HighestDebited,
        FieldKey::HighestCredited,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::BankName => "bank_name",
            FieldKey::CustomerName => "customer_name",
            FieldKey::Iban => "iban",
            FieldKey::AccountNumber => "account_number",
            FieldKey::PhoneNumber => "phone_number",
            FieldKey::Salary => "salary",
            FieldKey::StatementBalance => "statement_balance",
            FieldKey::HighestDebited => "highest_debited",
            FieldKey::HighestCredited => "highest_credited",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldKey::BankName => "Bank Name",
            FieldKey::CustomerName => "Customer Name",
            FieldKey::Iban => "IBAN",
            FieldKey::AccountNumber => "Account Number",
            FieldKey::PhoneNumber => "Phone Number",
            FieldKey::Salary => "Salary",
            FieldKey::StatementBalance => "Statement Balance",
            FieldKey::HighestDebited => "Highest Debited",
            FieldKey::HighestCredited => "Highest Credited",
        }
    }

    /// Fields holding bare numeric amounts.
    pub fn is_amount(self) -> bool {
        matches!(
            self,
            FieldKey::Salary
                | FieldKey::StatementBalance
                | FieldKey::HighestDebited
                | FieldKey::HighestCredited
        )
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Exactly nine string values in [`FieldKey::ALL`] order. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRecord {
    values: [String; FIELD_COUNT],
}

impl FieldRecord {
    pub fn new(values: [String; FIELD_COUNT]) -> Self {
        Self { values }
    }

    /// Build from a vector of exactly nine values; any other length is rejected.
    pub fn from_vec(values: Vec<String>) -> Option<Self> {
        <[String; FIELD_COUNT]>::try_from(values).ok().map(Self::new)
    }

    /// All fields set to [`UNKNOWN`].
    pub fn unknown() -> Self {
        Self::new(std::array::from_fn(|_| UNKNOWN.to_string()))
    }

    pub fn get(&self, key: FieldKey) -> &str {
        &self.values[key.index()]
    }

    pub fn values(&self) -> &[String; FIELD_COUNT] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &str)> {
        FieldKey::ALL
            .iter()
            .copied()
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn is_all_unknown(&self) -> bool {
        self.values.iter().all(|v| v == UNKNOWN)
    }
}

impl Serialize for FieldRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FIELD_COUNT))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}
