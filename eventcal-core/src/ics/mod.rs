//! iCalendar feeds: reading subscriptions and exporting calendars.

mod generate;
mod parse;

pub use generate::export_calendar;
pub use parse::IcsParser;
