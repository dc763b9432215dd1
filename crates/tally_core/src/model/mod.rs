mod task;
mod user;

pub use task::Task;
pub use user::User;
