//! Config - 통합 설정 관리
//!
//! - `anvil.rs` - AnvilConfig (캐시, 토큰, 속도 제한, 완성 파라미터)

mod anvil;

pub use anvil::{AnvilConfig, ANVIL_CONFIG_ENV, ANVIL_CONFIG_FILE};
