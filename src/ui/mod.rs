pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, error, header, section, status, success, warn};
pub use progress::{ImportProgress, Spinner};
pub use theme::{theme, Theme};
