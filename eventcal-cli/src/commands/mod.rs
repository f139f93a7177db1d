pub mod add;
pub mod calendars;
pub mod events;
pub mod export;
pub mod new;
pub mod refresh;
