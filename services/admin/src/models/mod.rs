//! Role administration models

pub mod data_rule;
pub mod menu;
pub mod pagination;
pub mod role;

// Re-export for convenience
pub use data_rule::DataRule;
pub use menu::Menu;
pub use pagination::{Page, PageParams};
pub use role::{
    CreateRoleParam, DeleteRoleParam, Role, RoleDetail, RoleQuery, UpdateRoleMenuParam,
    UpdateRoleParam, UpdateRoleRuleParam,
};
