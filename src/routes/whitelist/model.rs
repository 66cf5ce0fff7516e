use serde::{Deserialize, Serialize};

use crate::whitelist::WhitelistEntry;

// 白名单列表响应
#[derive(Debug, Serialize)]
pub struct WhitelistListResponse {
    pub enabled: bool,
    pub count: usize,
    pub users: Vec<WhitelistEntry>,
}

// 添加用户请求
#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub user_id: i64,
    pub display_name: Option<String>,
}

// 添加用户响应
#[derive(Debug, Serialize)]
pub struct AddUserResponse {
    pub user_id: i64,
    /// 此前不在白名单中
    pub added: bool,
}

// 移除用户响应
#[derive(Debug, Serialize)]
pub struct RemoveUserResponse {
    pub user_id: i64,
    pub removed: bool,
}

// 重新加载响应
#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub count: usize,
}
