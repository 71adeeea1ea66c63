pub mod payer;
pub mod transaction;
pub mod tournament;
pub mod inventory;

pub use payer::*;
pub use transaction::*;
pub use tournament::*;
pub use inventory::*;

use chrono::NaiveDate;

/// Today's date in the server's local calendar. Due dates and payment
/// dates are calendar dates, so billing follows the club's wall clock
/// rather than UTC.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
