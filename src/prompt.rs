use crate::models::{FIELD_COUNT, UNKNOWN};
use crate::types::ExtractedText;

/// System instruction sent with every extraction request.
pub const SYSTEM_PROMPT: &str =
    "You are a precise financial document analyzer. Always return valid JSON arrays.";

/// Render the user prompt for one document.
pub fn build_prompt(text: &ExtractedText) -> String {
    let unknown_array = format!(
        "[{}]",
        vec![format!("\"{}\"", UNKNOWN); FIELD_COUNT].join(", ")
    );
    format!(
        r#"You are an expert financial document analyzer. Extract the following information from this bank statement text.

EXTRACTION REQUIREMENTS:
- Bank name: The financial institution name
- Customer name: Account holder's full name
- IBAN: International Bank Account Number (if available)
- Account number: Primary account identifier
- Phone number: Customer contact number
- Salary: Regular income/salary deposits (amount only)
- Statement balance: Current or closing balance
- Highest spent amount: Largest debit/withdrawal transaction
- Highest received amount: Largest credit/deposit transaction

OUTPUT FORMAT: Return ONLY a JSON array with exactly {count} values in this order:
[Bank name, Customer name, IBAN, Account number, Phone number, Salary, Statement balance, Highest spent amount, Highest received amount]

IMPORTANT RULES:
- Use "{unknown}" for any missing information
- Include only numerical values for amounts (no currency symbols, no thousands separators)
- If this is not a bank statement, return: {unknown_array}

BANK STATEMENT TEXT:
{text}

JSON ARRAY:"#,
        count = FIELD_COUNT,
        unknown = UNKNOWN,
        unknown_array = unknown_array,
        text = text.render(),
    )
}
