use anyhow::Result;
use eventcal_core::Calendar;
use eventcal_core::ics::export_calendar;
use eventcal_core::store::{EventQuery, KindFilter};

use crate::App;

/// Print the calendar's master events, each with its active rule, as ICS.
pub fn run(app: &App, calendar: &Calendar) -> Result<()> {
    let store = app.store();
    let masters: Vec<_> = store
        .query(
            &EventQuery::new()
                .in_calendars([calendar.id])
                .of_kind(KindFilter::Masters),
        )
        .into_iter()
        .map(|event| {
            let rule = store.active_rule(event.id);
            (event, rule)
        })
        .collect();

    print!("{}", export_calendar(calendar, &masters, &store.venues()));
    Ok(())
}
