//! 에러 타입 정의

use thiserror::Error;

/// ESP 코어 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("직렬화 에러: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("유효하지 않은 파라미터: {reason}")]
    InvalidParameter { reason: String },

    #[error("메모리 풀 할당 실패: {requested} bytes")]
    AllocationFailure { requested: usize },

    #[error("청크 범위 초과: chunk_id={chunk_id}, total_chunks={total_chunks}")]
    ChunkOutOfRange { chunk_id: u32, total_chunks: u32 },

    #[error("청크 크기 초과: chunk_id={chunk_id}, size={size}, capacity={capacity}")]
    ChunkTooLarge {
        chunk_id: u32,
        size: usize,
        capacity: u32,
    },

    #[error("청크 미노출: chunk_id={chunk_id} (재시도 가능)")]
    ChunkNotReady { chunk_id: u32 },

    #[error("예비 슬롯 소진: 재노출 불가")]
    SurfaceExhausted,

    #[error("복구 모드 비활성: 재노출은 recovery_enabled 설정 필요")]
    RecoveryDisabled,

    #[error("표면 없음: file_id={file_id}")]
    SurfaceNotFound { file_id: String },

    #[error("표면 중복: file_id={file_id} 이미 등록됨")]
    DuplicateSurface { file_id: String },
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
