//! Storage module for Anvil
//!
//! - `json`: JSON 파일 저장/로드 (글로벌 `~/.config/anvil/`, 프로젝트 `.anvil/`)

mod json;

pub use json::{merge_json, JsonStore, GLOBAL_DIR_NAME, PROJECT_DIR_NAME};
