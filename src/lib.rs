//! # ESP (Exposure Surface Protocol)
//!
//! 노출(Exposure) 기반 청크 저장소 코어
//!
//! ## 핵심 특징
//! - **노출 패러다임**: 생산자가 청크를 공유 표면에 노출, 소비자는 ID로 자유롭게 pull
//! - **무연결**: 소비자별 연결 상태 없음, 순서/횟수 제약 없는 반복 pull
//! - **락 최소화**: publication 플래그가 가시성 배리어, pull은 락 프리
//! - **Red Flag**: 전 청크 노출 시 자동 완료 신호 (수동 조기 종료도 가능)
//! - **폴링 기반**: pull의 `NotReady`가 유일한 흐름 제어, 블로킹 없음
//! - **복구 재노출**: 예비 슬롯 스왑으로 이미 노출된 청크 덮어쓰기 (선택)
//!
//! 네트워크 전송/암호화는 이 크레이트 범위 밖이며, 표면은 순수 인메모리
//! 자료구조로 스레드/태스크 어느 쪽에서든 구동 가능하다.

pub mod chunk;
pub mod config;
pub mod error;
pub mod manifest;
pub mod pool;
pub mod registry;
pub mod stats;
pub mod surface;

pub use chunk::{ChunkRecord, ChunkView};
pub use config::{DigestPolicy, SurfaceConfig};
pub use error::{Error, Result};
pub use manifest::{ChunkId, Manifest};
pub use registry::SurfaceRegistry;
pub use stats::SurfaceStats;
pub use surface::{ExposureSurface, PullResult};

/// 프로토콜 버전
pub const PROTOCOL_VERSION: u8 = 1;

/// 기본 청크 크기 (바이트)
pub const DEFAULT_CHUNK_SIZE: u32 = 65536; // 64KB

/// 청크 크기 상한 (바이트)
pub const MAX_CHUNK_SIZE: u32 = 65536;

/// 표면당 청크 수 상한
pub const MAX_TOTAL_CHUNKS: u32 = 1 << 20;

/// 파일 ID 최대 길이 (바이트)
pub const MAX_FILE_ID_LEN: usize = 64;

/// 콘텐츠 지문 길이 (SHA-256)
pub const FINGERPRINT_LEN: usize = 32;
