pub mod add;
pub mod check;
pub mod due;
pub mod fav;
pub mod grade;
pub mod list;
pub mod rm;
pub mod show;
pub mod stats;
pub mod sync;
pub mod tag;
