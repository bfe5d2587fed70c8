//! 매니페스트 정의
//!
//! 논리 데이터셋의 청킹 계획과 정체성을 기술하는 불변 값 타입.
//! 표면 생성 이후에는 절대 변경되지 않는다.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::{FINGERPRINT_LEN, MAX_CHUNK_SIZE, MAX_FILE_ID_LEN, MAX_TOTAL_CHUNKS};

/// 청크 ID (32비트, 테이블 인덱스와 동일)
pub type ChunkId = u32;

/// 인코딩 태그: 무변환 원본 바이트
pub const ENCODING_RAW: u16 = 0;

/// 매니페스트 - 데이터셋 오케스트레이션 청사진
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// 파일 식별자 (최대 64바이트)
    pub file_id: String,

    /// 전체 페이로드 크기 (바이트)
    pub total_size: u64,

    /// 청크 크기 (바이트)
    pub chunk_size: u32,

    /// 인코딩 태그
    pub encoding_type: u16,

    /// 노출 주기 힌트 (밀리초, 생산자 페이싱용)
    pub exposure_cadence_ms: u32,

    /// 총 청크 수
    pub total_chunks: u32,

    /// 전체 콘텐츠의 SHA-256 지문
    pub fingerprint: [u8; FINGERPRINT_LEN],
}

impl Manifest {
    /// 새 매니페스트 생성 (지문은 0으로 초기화)
    ///
    /// `total_chunks`는 `ceil(total_size / chunk_size)`로 계산된다.
    pub fn new(file_id: impl Into<String>, total_size: u64, chunk_size: u32) -> Result<Self> {
        let manifest = Self {
            file_id: file_id.into(),
            total_size,
            chunk_size,
            encoding_type: ENCODING_RAW,
            exposure_cadence_ms: 0,
            total_chunks: Self::chunk_count_for(total_size, chunk_size),
            fingerprint: [0u8; FINGERPRINT_LEN],
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// 데이터 버퍼로부터 매니페스트 생성 (SHA-256 지문 계산 포함)
    pub fn for_data(file_id: impl Into<String>, data: &[u8], chunk_size: u32) -> Result<Self> {
        let mut manifest = Self::new(file_id, data.len() as u64, chunk_size)?;
        let mut hasher = Sha256::new();
        hasher.update(data);
        manifest.fingerprint.copy_from_slice(&hasher.finalize());
        Ok(manifest)
    }

    /// 전체 크기와 청크 크기로 청크 수 계산
    fn chunk_count_for(total_size: u64, chunk_size: u32) -> u32 {
        if chunk_size == 0 {
            return 0;
        }
        ((total_size + chunk_size as u64 - 1) / chunk_size as u64) as u32
    }

    /// 매니페스트 유효성 검증
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidParameter {
            reason: reason.to_string(),
        };

        if self.file_id.is_empty() {
            return Err(invalid("file_id가 비어 있음"));
        }
        if self.file_id.len() > MAX_FILE_ID_LEN {
            return Err(invalid("file_id가 64바이트 초과"));
        }
        if self.total_size == 0 {
            return Err(invalid("total_size는 0보다 커야 함"));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(invalid("chunk_size가 허용 범위 밖"));
        }
        if self.total_chunks == 0 || self.total_chunks > MAX_TOTAL_CHUNKS {
            return Err(invalid("total_chunks가 허용 범위 밖"));
        }
        if self.total_chunks != Self::chunk_count_for(self.total_size, self.chunk_size) {
            return Err(invalid("total_chunks != ceil(total_size / chunk_size)"));
        }
        Ok(())
    }

    /// 해당 청크의 선언 용량 (마지막 청크는 나머지 크기)
    pub fn chunk_capacity(&self, chunk_id: ChunkId) -> u32 {
        debug_assert!(chunk_id < self.total_chunks);
        let offset = self.chunk_offset(chunk_id);
        let remaining = self.total_size - offset;
        remaining.min(self.chunk_size as u64) as u32
    }

    /// 논리 스트림 내 바이트 오프셋
    pub fn chunk_offset(&self, chunk_id: ChunkId) -> u64 {
        chunk_id as u64 * self.chunk_size as u64
    }

    /// 바이트로 직렬화 (전송 계층 경계용)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// 바이트에서 역직렬화 + 검증
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let manifest: Manifest = bincode::deserialize(bytes)?;
        manifest.validate()?;
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_count_ceil() {
        let m = Manifest::new("file-1", 1024, 256).unwrap();
        assert_eq!(m.total_chunks, 4);

        let m = Manifest::new("file-2", 1025, 256).unwrap();
        assert_eq!(m.total_chunks, 5);
        assert_eq!(m.chunk_capacity(4), 1);
        assert_eq!(m.chunk_capacity(3), 256);
    }

    #[test]
    fn test_chunk_offset() {
        let m = Manifest::new("file-1", 1000, 256).unwrap();
        assert_eq!(m.chunk_offset(0), 0);
        assert_eq!(m.chunk_offset(3), 768);
        assert_eq!(m.chunk_capacity(3), 232);
    }

    #[test]
    fn test_validation_rejects_bad_fields() {
        assert!(Manifest::new("", 1024, 256).is_err());
        assert!(Manifest::new("x".repeat(65), 1024, 256).is_err());
        assert!(Manifest::new("file", 0, 256).is_err());
        assert!(Manifest::new("file", 1024, 0).is_err());
        assert!(Manifest::new("file", 1024, MAX_CHUNK_SIZE + 1).is_err());

        // 수동으로 깨뜨린 청크 수
        let mut m = Manifest::new("file", 1024, 256).unwrap();
        m.total_chunks = 3;
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_fingerprint_for_data() {
        let data = vec![7u8; 600];
        let m = Manifest::for_data("file", &data, 256).unwrap();
        assert_eq!(m.total_chunks, 3);
        assert_ne!(m.fingerprint, [0u8; FINGERPRINT_LEN]);

        // 동일 데이터는 동일 지문
        let m2 = Manifest::for_data("file", &data, 256).unwrap();
        assert_eq!(m.fingerprint, m2.fingerprint);
    }

    #[test]
    fn test_manifest_serialization() {
        let m = Manifest::for_data("file-rt", &[1, 2, 3, 4, 5], 2).unwrap();
        let bytes = m.to_bytes().unwrap();
        let restored = Manifest::from_bytes(&bytes).unwrap();
        assert_eq!(m, restored);
    }
}
