pub mod calendar;
pub mod canvas;
pub mod composer;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod holidays;
pub mod ics;
pub mod layout;
pub mod text;
pub mod weather;
