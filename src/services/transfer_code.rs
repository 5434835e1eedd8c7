use chrono::NaiveDate;
use rand::Rng;

/// Produces candidate transfer codes. Uniqueness is enforced by the database;
/// a generator only needs to make collisions unlikely.
pub trait TransferCodeGenerator: Send + Sync {
    fn generate(&self, prefix: &str, date: NaiveDate) -> String;
}

/// `PREFIX-YYYYMMDD-NNNN` with a random four digit suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTransferCode;

impl TransferCodeGenerator for RandomTransferCode {
    fn generate(&self, prefix: &str, date: NaiveDate) -> String {
        let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
        format_code(prefix, date, suffix)
    }
}

pub fn format_code(prefix: &str, date: NaiveDate, suffix: u16) -> String {
    format!("{}-{}-{:04}", prefix, date.format("%Y%m%d"), suffix % 10_000)
}
