//! 청크 테이블 레코드 정의
//!
//! 레코드는 페이로드를 소유하지 않고 풀 슬롯 인덱스로만 참조한다.
//! 교차 스레드 가변 상태는 전부 원자 필드로, 표면 전체 락은 없다.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

use crate::manifest::ChunkId;

/// 청크 상태: 미노출
pub(crate) const STATE_VACANT: u8 = 0;

/// 청크 상태: 노출 진행 중 (페이로드 복사 중)
pub(crate) const STATE_WRITING: u8 = 1;

/// 청크 상태: 노출 완료
pub(crate) const STATE_PUBLISHED: u8 = 2;

/// 위치 워드 비트 배치: [generation:23][slot:24][size:17]
///
/// 슬롯 인덱스/크기/세대를 한 워드로 묶어 재노출 스왑이 원자적으로 보이게
/// 한다. 세대 비트는 스왑마다 증가하므로, 같은 슬롯이 free 리스트를 거쳐
/// 같은 청크로 되돌아와도 워드 값이 달라진다 (ABA 차단).
pub(crate) const SIZE_BITS: u32 = 17;
pub(crate) const SLOT_BITS: u32 = 24;
const SIZE_MASK: u64 = (1 << SIZE_BITS) - 1;
const SLOT_MASK: u64 = (1 << SLOT_BITS) - 1;
const GEN_SHIFT: u32 = SIZE_BITS + SLOT_BITS;

/// 풀 슬롯 수 상한 (위치 워드의 슬롯 비트 폭)
pub(crate) const MAX_POOL_SLOTS: u32 = 1 << SLOT_BITS;

#[inline]
pub(crate) fn pack_loc(generation: u64, slot: u32, size: u32) -> u64 {
    debug_assert!((slot as u64) <= SLOT_MASK);
    debug_assert!((size as u64) <= SIZE_MASK);
    (generation << GEN_SHIFT) | ((slot as u64) << SIZE_BITS) | size as u64
}

#[inline]
pub(crate) fn unpack_loc(loc: u64) -> (u32, u32) {
    (
        ((loc >> SIZE_BITS) & SLOT_MASK) as u32,
        (loc & SIZE_MASK) as u32,
    )
}

#[inline]
pub(crate) fn loc_generation(loc: u64) -> u64 {
    loc >> GEN_SHIFT
}

/// 현재 시각 (마이크로초, UNIX epoch 기준)
pub(crate) fn now_us() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

/// 청크 레코드 (테이블 인덱스 == sequence_id)
#[derive(Debug)]
pub struct ChunkRecord {
    /// 시퀀스 ID (0부터 조밀)
    sequence_id: ChunkId,

    /// 선언 용량 (마지막 청크는 chunk_size보다 작을 수 있음)
    capacity: u32,

    /// 논리 스트림 내 바이트 오프셋
    offset: u64,

    /// 발행 상태 (VACANT / WRITING / PUBLISHED)
    state: AtomicU8,

    /// 슬롯 인덱스 + 발행 크기 + 스왑 세대 패킹 워드
    loc: AtomicU64,

    /// 페이로드 다이제스트 (정책에 따라 CRC32 또는 0)
    digest: AtomicU32,

    /// 노출 시각 (마이크로초)
    exposed_at_us: AtomicU64,

    /// 누적 pull 횟수
    pull_count: AtomicU32,
}

impl ChunkRecord {
    /// 새 레코드 생성 (미노출 상태, 기본 슬롯 배정)
    pub(crate) fn new(sequence_id: ChunkId, capacity: u32, offset: u64) -> Self {
        Self {
            sequence_id,
            capacity,
            offset,
            state: AtomicU8::new(STATE_VACANT),
            loc: AtomicU64::new(pack_loc(0, sequence_id, 0)),
            digest: AtomicU32::new(0),
            exposed_at_us: AtomicU64::new(0),
            pull_count: AtomicU32::new(0),
        }
    }

    /// 시퀀스 ID
    pub fn sequence_id(&self) -> ChunkId {
        self.sequence_id
    }

    /// 선언 용량
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// 발행 여부 (acquire - 이후의 슬롯 읽기에 대한 가시성 배리어)
    pub fn is_published(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_PUBLISHED
    }

    /// 최초 노출 선점 시도 (VACANT -> WRITING)
    ///
    /// 성공한 호출자만 기본 슬롯에 쓸 수 있다.
    pub(crate) fn try_claim(&self) -> bool {
        self.state
            .compare_exchange(
                STATE_VACANT,
                STATE_WRITING,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// 발행 확정 (WRITING -> PUBLISHED, release)
    ///
    /// 페이로드 바이트가 슬롯에 완전히 복사된 뒤에만 호출해야 한다.
    pub(crate) fn publish(&self, slot: u32, size: u32, digest: u32) {
        self.loc.store(pack_loc(0, slot, size), Ordering::Relaxed);
        self.digest.store(digest, Ordering::Relaxed);
        self.exposed_at_us.store(now_us(), Ordering::Relaxed);
        self.state.store(STATE_PUBLISHED, Ordering::Release);
    }

    /// 재노출 스왑: 새 슬롯 + 세대 증가로 위치 워드 교체, 이전 슬롯 반환
    ///
    /// 호출 전에 새 슬롯의 바이트 복사가 끝나 있어야 한다.
    pub(crate) fn swap_slot(&self, new_slot: u32, size: u32, digest: u32) -> u32 {
        self.digest.store(digest, Ordering::Relaxed);
        self.exposed_at_us.store(now_us(), Ordering::Relaxed);

        let mut cur = self.loc.load(Ordering::Acquire);
        loop {
            let next = pack_loc(loc_generation(cur) + 1, new_slot, size);
            match self
                .loc
                .compare_exchange(cur, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return unpack_loc(cur).0,
                Err(observed) => cur = observed,
            }
        }
    }

    /// 현재 위치 워드 (acquire) - pull의 복사 후 재검증용
    pub(crate) fn location_word(&self) -> u64 {
        self.loc.load(Ordering::Acquire)
    }

    /// 현재 (슬롯, 크기) 쌍 (acquire)
    pub(crate) fn location(&self) -> (u32, u32) {
        unpack_loc(self.loc.load(Ordering::Acquire))
    }

    /// 저장된 다이제스트
    pub fn digest(&self) -> u32 {
        self.digest.load(Ordering::Relaxed)
    }

    /// pull 횟수 증가
    pub(crate) fn record_pull(&self) -> u32 {
        self.pull_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 메타데이터 스냅샷 (무복사 상태 조회)
    pub fn view(&self) -> ChunkView {
        let is_published = self.is_published();
        let (_, size) = self.location();
        ChunkView {
            sequence_id: self.sequence_id,
            capacity: self.capacity,
            offset: self.offset,
            size: if is_published { size } else { 0 },
            digest: self.digest.load(Ordering::Relaxed),
            is_published,
            exposed_at_us: self.exposed_at_us.load(Ordering::Relaxed),
            pull_count: self.pull_count.load(Ordering::Relaxed),
        }
    }
}

/// 청크 메타데이터 뷰 (peek 결과)
#[derive(Debug, Clone, Copy)]
pub struct ChunkView {
    /// 시퀀스 ID
    pub sequence_id: ChunkId,

    /// 선언 용량
    pub capacity: u32,

    /// 논리 스트림 내 오프셋
    pub offset: u64,

    /// 발행된 페이로드 크기 (미노출이면 0)
    pub size: u32,

    /// 페이로드 다이제스트
    pub digest: u32,

    /// 발행 여부
    pub is_published: bool,

    /// 노출 시각 (마이크로초, 미노출이면 0)
    pub exposed_at_us: u64,

    /// 누적 pull 횟수
    pub pull_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loc_packing() {
        let loc = pack_loc(5, 0x12_3456, 65536);
        assert_eq!(unpack_loc(loc), (0x12_3456, 65536));
        assert_eq!(loc_generation(loc), 5);

        let loc = pack_loc(0, 0, 0);
        assert_eq!(unpack_loc(loc), (0, 0));
        assert_eq!(loc_generation(loc), 0);
    }

    #[test]
    fn test_swap_bumps_generation() {
        let record = ChunkRecord::new(0, 256, 0);
        record.try_claim();
        record.publish(0, 256, 1);
        let word0 = record.location_word();

        // 같은 슬롯/크기로 되돌아와도 세대 비트 때문에 워드가 달라진다
        record.swap_slot(9, 256, 2);
        let word1 = record.location_word();
        record.swap_slot(0, 256, 3);
        let word2 = record.location_word();

        assert_eq!(unpack_loc(word0), unpack_loc(word2));
        assert_ne!(word0, word1);
        assert_ne!(word0, word2);
        assert_eq!(loc_generation(word2), 2);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let record = ChunkRecord::new(3, 256, 768);
        assert!(record.try_claim());
        assert!(!record.try_claim());
        assert!(!record.is_published());

        record.publish(3, 200, 0xDEAD);
        assert!(record.is_published());
        assert!(!record.try_claim());
    }

    #[test]
    fn test_view_reflects_publication() {
        let record = ChunkRecord::new(1, 256, 256);
        let view = record.view();
        assert!(!view.is_published);
        assert_eq!(view.size, 0);
        assert_eq!(view.pull_count, 0);

        record.publish(1, 100, 42);
        record.record_pull();
        record.record_pull();

        let view = record.view();
        assert!(view.is_published);
        assert_eq!(view.size, 100);
        assert_eq!(view.digest, 42);
        assert_eq!(view.pull_count, 2);
        assert!(view.exposed_at_us > 0);
    }

    #[test]
    fn test_swap_slot_returns_old() {
        let record = ChunkRecord::new(0, 256, 0);
        record.try_claim();
        record.publish(0, 256, 1);

        let old = record.swap_slot(9, 128, 2);
        assert_eq!(old, 0);
        assert_eq!(record.location(), (9, 128));
        assert_eq!(record.digest(), 2);
    }
}
