mod handler;
mod model;

pub use handler::{add_user, list_users, reload, remove_user};
pub use model::{AddUserRequest, AddUserResponse, ReloadResponse, RemoveUserResponse, WhitelistListResponse};
