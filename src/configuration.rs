use crate::schedule::Schedule;
use std::path::PathBuf;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn website_title(&self) -> String;
    /// Operator password; admin routes are closed while unset.
    fn password(&self) -> Option<String>;
    fn port(&self) -> String;
    fn database_url(&self) -> Option<String>;
    fn bookings_file(&self) -> Option<PathBuf>;
    /// Number that receives the business copy of every notification.
    fn business_phone(&self) -> Option<String>;
    fn schedule(&self) -> Schedule;
}
