//! 표면 동작 정책 설정
//!
//! 재노출(복구) 의미론과 무결성 다이제스트 알고리즘은 고정 동작이 아니라
//! 정책으로 선택한다.

/// 청크 무결성 다이제스트 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestPolicy {
    /// 다이제스트 없음 (최고 속도)
    None,

    /// CRC32 (기본, 빠른 검증용)
    Crc32,
}

impl DigestPolicy {
    /// 페이로드의 다이제스트 계산 (None 정책은 0)
    pub fn compute(&self, payload: &[u8]) -> u32 {
        match self {
            DigestPolicy::None => 0,
            DigestPolicy::Crc32 => crc32fast::hash(payload),
        }
    }
}

/// 표면 설정
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// 청크 다이제스트 정책
    pub digest: DigestPolicy,

    /// 복구 모드 (재노출 허용 여부)
    pub recovery_enabled: bool,

    /// 재노출 슬롯 스왑용 예비 슬롯 수
    /// 복구 모드가 꺼져 있으면 할당되지 않음
    pub spare_slots: u32,

    /// pull 시 다이제스트 재검증 여부
    pub verify_on_pull: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            digest: DigestPolicy::Crc32,
            recovery_enabled: false,
            spare_slots: 0,
            verify_on_pull: false,
        }
    }
}

impl SurfaceConfig {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 복구(재노출) 가능 설정
    pub fn recoverable() -> Self {
        Self {
            digest: DigestPolicy::Crc32,
            recovery_enabled: true,
            spare_slots: 8,
            verify_on_pull: false,
        }
    }

    /// 저사양 기기용 설정 (다이제스트 생략)
    pub fn low_spec() -> Self {
        Self {
            digest: DigestPolicy::None,
            recovery_enabled: false,
            spare_slots: 0,
            verify_on_pull: false,
        }
    }

    /// 무결성 우선 설정 (pull마다 재검증)
    pub fn integrity_first() -> Self {
        Self {
            digest: DigestPolicy::Crc32,
            recovery_enabled: true,
            spare_slots: 16,
            verify_on_pull: true,
        }
    }

    /// 실제 할당할 예비 슬롯 수
    pub fn effective_spare_slots(&self) -> u32 {
        if self.recovery_enabled {
            self.spare_slots
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_policy() {
        let payload = b"hello exposure";
        assert_eq!(DigestPolicy::None.compute(payload), 0);
        assert_eq!(
            DigestPolicy::Crc32.compute(payload),
            crc32fast::hash(payload)
        );
    }

    #[test]
    fn test_spare_slots_require_recovery() {
        let mut config = SurfaceConfig::default();
        config.spare_slots = 32;
        assert_eq!(config.effective_spare_slots(), 0);

        config.recovery_enabled = true;
        assert_eq!(config.effective_spare_slots(), 32);
    }
}
