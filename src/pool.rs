//! 메모리 풀 (단일 아레나 + 예비 슬롯)
//!
//! 전 청크 페이로드를 담는 연속 할당 하나를 고정 크기 슬롯으로 나눈다.
//! 청크 레코드는 독립 포인터가 아니라 슬롯 인덱스로만 풀을 참조한다.
//!
//! 동기화 규약: 슬롯 쓰기는 해당 슬롯을 배타 소유한 생산자만 수행하고
//! (미발행 청크의 기본 슬롯 또는 free 리스트에서 막 꺼낸 예비 슬롯),
//! 읽기는 청크의 publication 플래그 acquire 로드 이후에만 수행한다.
//! 이 규약이 슬롯 바이트에 대한 별도 락을 불필요하게 만든다.

use std::cell::UnsafeCell;
use std::ptr;

use parking_lot::Mutex;

use crate::chunk::MAX_POOL_SLOTS;
use crate::error::{Error, Result};

/// 고정 크기 슬롯 아레나
pub struct MemoryPool {
    /// 아레나 바이트. 접근은 슬롯 소유권 규약을 따르는
    /// write_slot / read_slot 으로만 이루어진다.
    arena: UnsafeCell<Box<[u8]>>,

    /// 슬롯 하나의 크기 (바이트)
    slot_size: usize,

    /// 총 슬롯 수 (기본 + 예비)
    slot_count: u32,

    /// 재노출 스왑용 예비 슬롯 free 리스트
    /// 최초 노출 경로는 이 락을 절대 잡지 않는다.
    free_slots: Mutex<Vec<u32>>,
}

// 아레나 접근이 모듈 헤더의 슬롯 소유권 규약을 따르는 한
// 교차 스레드 공유는 안전하다.
unsafe impl Send for MemoryPool {}
unsafe impl Sync for MemoryPool {}

impl MemoryPool {
    /// 풀 생성: 기본 슬롯 `primary_slots`개 + 예비 슬롯 `spare_slots`개
    ///
    /// 슬롯 수/크기 계산이 넘치면 `InvalidParameter`, 예약 실패 시
    /// `AllocationFailure`. 어느 쪽이든 부분 할당은 남기지 않는다.
    pub fn new(slot_size: u32, primary_slots: u32, spare_slots: u32) -> Result<Self> {
        let slot_count = primary_slots
            .checked_add(spare_slots)
            .filter(|&n| n <= MAX_POOL_SLOTS)
            .ok_or_else(|| Error::InvalidParameter {
                reason: "슬롯 수가 허용 범위 초과".to_string(),
            })?;
        let total = (slot_size as usize)
            .checked_mul(slot_count as usize)
            .ok_or_else(|| Error::InvalidParameter {
                reason: "풀 크기 계산 오버플로".to_string(),
            })?;

        let mut arena = Vec::new();
        arena
            .try_reserve_exact(total)
            .map_err(|_| Error::AllocationFailure { requested: total })?;
        arena.resize(total, 0u8);

        Ok(Self {
            arena: UnsafeCell::new(arena.into_boxed_slice()),
            slot_size: slot_size as usize,
            slot_count,
            free_slots: Mutex::new((primary_slots..slot_count).collect()),
        })
    }

    /// 슬롯 크기 (바이트)
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// 총 슬롯 수
    pub fn slot_count(&self) -> u32 {
        self.slot_count
    }

    /// 아레나 전체 크기 (바이트)
    pub fn arena_len(&self) -> usize {
        self.slot_size * self.slot_count as usize
    }

    /// 남은 예비 슬롯 수
    pub fn spare_remaining(&self) -> usize {
        self.free_slots.lock().len()
    }

    /// 예비 슬롯 획득 (재노출 전용), 소진 시 None
    pub(crate) fn acquire_spare(&self) -> Option<u32> {
        self.free_slots.lock().pop()
    }

    /// 슬롯 반납 (재노출 스왑에서 밀려난 이전 슬롯)
    pub(crate) fn release_slot(&self, slot: u32) {
        debug_assert!(slot < self.slot_count);
        self.free_slots.lock().push(slot);
    }

    /// 슬롯에 페이로드 복사
    ///
    /// 호출자는 이 슬롯의 배타 소유권을 보장해야 한다 (모듈 헤더 규약).
    pub(crate) fn write_slot(&self, slot: u32, payload: &[u8]) {
        assert!(slot < self.slot_count, "슬롯 인덱스 범위 초과");
        assert!(payload.len() <= self.slot_size, "페이로드가 슬롯 크기 초과");

        // SAFETY: 슬롯은 호출자가 배타 소유 중이므로 이 범위를 동시에
        // 읽거나 쓰는 스레드가 없다. 슬롯 경계 검사는 위의 assert가 수행.
        unsafe {
            let base = (*self.arena.get()).as_mut_ptr();
            let dst = base.add(slot as usize * self.slot_size);
            ptr::copy_nonoverlapping(payload.as_ptr(), dst, payload.len());
        }
    }

    /// 슬롯에서 `len` 바이트를 dest로 복사
    ///
    /// 호출자는 publication 플래그의 acquire 로드를 선행해야 한다.
    pub(crate) fn read_slot(&self, slot: u32, len: usize, dest: &mut [u8]) {
        assert!(slot < self.slot_count, "슬롯 인덱스 범위 초과");
        assert!(len <= self.slot_size, "읽기 길이가 슬롯 크기 초과");
        assert!(len <= dest.len(), "목적지 버퍼 부족");

        // SAFETY: 발행된 슬롯의 바이트는 재노출 스왑 전까지 불변이고,
        // acquire 로드가 쓰기 완료에 대한 happens-before를 보장한다.
        unsafe {
            let base = (*self.arena.get()).as_ptr();
            let src = base.add(slot as usize * self.slot_size);
            ptr::copy_nonoverlapping(src, dest.as_mut_ptr(), len);
        }
    }
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("slot_size", &self.slot_size)
            .field("slot_count", &self.slot_count)
            .field("spare_remaining", &self.spare_remaining())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_roundtrip() {
        let pool = MemoryPool::new(256, 4, 0).unwrap();
        assert_eq!(pool.arena_len(), 1024);

        let payload: Vec<u8> = (0..200).map(|i| i as u8).collect();
        pool.write_slot(2, &payload);

        let mut dest = vec![0u8; 256];
        pool.read_slot(2, payload.len(), &mut dest);
        assert_eq!(&dest[..payload.len()], &payload[..]);
    }

    #[test]
    fn test_slots_do_not_overlap() {
        let pool = MemoryPool::new(16, 3, 0).unwrap();
        pool.write_slot(0, &[0xAA; 16]);
        pool.write_slot(1, &[0xBB; 16]);
        pool.write_slot(2, &[0xCC; 16]);

        let mut dest = [0u8; 16];
        pool.read_slot(1, 16, &mut dest);
        assert_eq!(dest, [0xBB; 16]);
    }

    #[test]
    fn test_spare_slot_lifecycle() {
        let pool = MemoryPool::new(64, 4, 2).unwrap();
        assert_eq!(pool.spare_remaining(), 2);

        let a = pool.acquire_spare().unwrap();
        let b = pool.acquire_spare().unwrap();
        assert!(a >= 4 && b >= 4);
        assert!(pool.acquire_spare().is_none());

        pool.release_slot(a);
        assert_eq!(pool.acquire_spare(), Some(a));
    }

    #[test]
    fn test_slot_count_overflow_is_error() {
        assert!(matches!(
            MemoryPool::new(256, 4, u32::MAX),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            MemoryPool::new(256, 4, MAX_POOL_SLOTS),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(MemoryPool::new(256, 4, 4).is_ok());
    }
}
