// smartmarks state managers
// Each manager owns one slice of client state: session, collection, change feed, form.

pub mod bookmark_manager;
pub mod change_feed_manager;
pub mod form_manager;
pub mod session_manager;
