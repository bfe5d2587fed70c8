//! 노출 표면 (Exposure Surface) - 코어 추상화
//!
//! 매니페스트 + 청크 테이블 + 메모리 풀의 집합체.
//! 생산자 여럿이 expose로 쓰고, 소비자 여럿이 peek/pull로 읽는다.
//! 어떤 연산도 블로킹하지 않으며, pull의 `NotReady`가 유일한 대기 수단이다.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};

use crate::chunk::{unpack_loc, ChunkRecord};
use crate::config::{DigestPolicy, SurfaceConfig};
use crate::error::{Error, Result};
use crate::manifest::{ChunkId, Manifest};
use crate::pool::MemoryPool;
use crate::stats::SurfaceStats;

/// pull 결과 (배타적 variant, 센티넬 정수 없음)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullResult {
    /// 복사 완료, 페이로드 크기
    Pulled(u32),

    /// 아직 미노출 - 정상적인 재시도 대상, 에러 아님
    NotReady,

    /// 범위 밖 chunk_id
    NotFound,

    /// 목적지 버퍼가 발행 크기보다 작음 (버퍼는 건드리지 않음)
    BufferTooSmall { needed: u32 },
}

impl PullResult {
    /// 복사 성공 여부
    pub fn is_pulled(&self) -> bool {
        matches!(self, PullResult::Pulled(_))
    }

    /// 재시도 대상 여부
    pub fn is_not_ready(&self) -> bool {
        matches!(self, PullResult::NotReady)
    }
}

/// 노출 표면
///
/// 생성 후 매니페스트는 불변. 교차 스레드 가변 상태는 원자 필드뿐이며
/// 표면 전체를 덮는 락은 없다 (free 리스트 락은 재노출 경로 한정).
/// 해제는 Drop 한 번으로 풀과 테이블이 함께 반환된다.
pub struct ExposureSurface {
    /// 매니페스트 (값 소유)
    manifest: Manifest,

    /// 동작 정책
    config: SurfaceConfig,

    /// 청크 테이블 (길이 == total_chunks 고정)
    chunks: Box<[ChunkRecord]>,

    /// 페이로드 아레나
    pool: MemoryPool,

    /// 노출된 청크 수
    exposed_count: AtomicU32,

    /// 노출된 총 바이트
    total_bytes_exposed: AtomicU64,

    /// 누적 pull 수 (표면 전체)
    total_pulls: AtomicU64,

    /// 완료 신호 (red flag) - 한 번 true면 영구 true
    red_flag: AtomicBool,

    /// 생성 시각 (처리율 계산 기준)
    started_at: Instant,
}

impl ExposureSurface {
    /// 기본 정책으로 표면 생성
    pub fn new(manifest: Manifest) -> Result<Self> {
        Self::with_config(manifest, SurfaceConfig::default())
    }

    /// 지정 정책으로 표면 생성
    ///
    /// 매니페스트 검증 실패는 `InvalidParameter`, 풀 예약 실패는
    /// `AllocationFailure`. 실패 시 부분 생성된 표면은 남지 않는다.
    pub fn with_config(manifest: Manifest, config: SurfaceConfig) -> Result<Self> {
        manifest.validate()?;

        let pool = MemoryPool::new(
            manifest.chunk_size,
            manifest.total_chunks,
            config.effective_spare_slots(),
        )?;

        let chunks: Box<[ChunkRecord]> = (0..manifest.total_chunks)
            .map(|id| ChunkRecord::new(id, manifest.chunk_capacity(id), manifest.chunk_offset(id)))
            .collect();

        info!(
            file_id = %manifest.file_id,
            total_chunks = manifest.total_chunks,
            pool_bytes = pool.arena_len(),
            "표면 생성"
        );

        Ok(Self {
            manifest,
            config,
            chunks,
            pool,
            exposed_count: AtomicU32::new(0),
            total_bytes_exposed: AtomicU64::new(0),
            total_pulls: AtomicU64::new(0),
            red_flag: AtomicBool::new(false),
            started_at: Instant::now(),
        })
    }

    /// 매니페스트 참조
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// 총 청크 수
    pub fn total_chunks(&self) -> u32 {
        self.manifest.total_chunks
    }

    /// 현재 노출된 청크 수
    pub fn exposed_count(&self) -> u32 {
        self.exposed_count.load(Ordering::Acquire)
    }

    /// 청크 노출 (생산자)
    ///
    /// 범위 밖 ID나 용량 초과/빈 페이로드는 부작용 없이 false.
    /// 이미 노출된(또는 노출 진행 중인) 청크의 반복 노출은 카운터를
    /// 건드리지 않는 no-op이며 true를 반환한다 (중복은 에러가 아님).
    pub fn expose(&self, chunk_id: ChunkId, payload: &[u8]) -> bool {
        let Some(chunk) = self.chunks.get(chunk_id as usize) else {
            debug!(chunk_id, "expose 거부: 범위 밖");
            return false;
        };
        if payload.is_empty() || payload.len() > chunk.capacity() as usize {
            debug!(
                chunk_id,
                size = payload.len(),
                capacity = chunk.capacity(),
                "expose 거부: 페이로드 크기"
            );
            return false;
        }

        // 최초 노출 선점 - 패자는 카운터 증가 없이 성공 처리
        if !chunk.try_claim() {
            return true;
        }

        self.publish_first(chunk, payload);
        true
    }

    /// 선점에 성공한 청크의 발행 확정 + 카운터 갱신
    fn publish_first(&self, chunk: &ChunkRecord, payload: &[u8]) {
        let slot = chunk.sequence_id();
        self.pool.write_slot(slot, payload);
        let digest = self.config.digest.compute(payload);
        chunk.publish(slot, payload.len() as u32, digest);

        self.total_bytes_exposed
            .fetch_add(payload.len() as u64, Ordering::Relaxed);
        let exposed = self.exposed_count.fetch_add(1, Ordering::AcqRel) + 1;
        if exposed == self.manifest.total_chunks {
            // 마지막 청크를 노출한 쪽이 자동으로 red flag를 올린다
            self.raise_red_flag();
        }
    }

    /// 연속 ID 범위에 대한 일괄 노출, 성공 수 반환
    ///
    /// 유효하지 않은 항목은 건너뛰고 계속 진행한다. 이미 성공한 항목은
    /// 롤백하지 않는다 (부분 성공이 정의된 동작).
    pub fn expose_batch<P: AsRef<[u8]>>(&self, start_id: ChunkId, payloads: &[P]) -> u32 {
        let mut successes = 0;
        for (i, payload) in payloads.iter().enumerate() {
            // ID 공간 끝을 넘는 항목은 랩어라운드 없이 실패로 건너뜀
            let Some(chunk_id) = start_id.checked_add(i as u32) else {
                continue;
            };
            if self.expose(chunk_id, payload.as_ref()) {
                successes += 1;
            }
        }
        successes
    }

    /// 버퍼 전체를 매니페스트 청킹 계획대로 쪼개 노출, 성공 수 반환
    pub fn expose_all(&self, data: &[u8]) -> u32 {
        let chunk_size = self.manifest.chunk_size as usize;
        let mut successes = 0;
        for (id, piece) in data.chunks(chunk_size).enumerate() {
            if self.expose(id as ChunkId, piece) {
                successes += 1;
            }
        }
        successes
    }

    /// 재노출 (복구 모드 전용)
    ///
    /// 발행된 청크의 바이트를 예비 슬롯 스왑으로 완전히 교체한다:
    /// 새 슬롯에 복사를 끝낸 뒤 위치 워드를 원자적으로 바꾸므로
    /// 기존 슬롯을 읽던 pull은 이전 바이트를 온전히 본다.
    /// 미노출 청크에 대한 재노출은 최초 노출로 처리된다.
    /// 카운터는 최초 노출 경로에서만 증가한다.
    pub fn re_expose(&self, chunk_id: ChunkId, payload: &[u8]) -> Result<()> {
        if !self.config.recovery_enabled {
            return Err(Error::RecoveryDisabled);
        }
        let chunk = self
            .chunks
            .get(chunk_id as usize)
            .ok_or(Error::ChunkOutOfRange {
                chunk_id,
                total_chunks: self.manifest.total_chunks,
            })?;
        if payload.is_empty() {
            return Err(Error::InvalidParameter {
                reason: "빈 페이로드는 재노출 불가".to_string(),
            });
        }
        if payload.len() > chunk.capacity() as usize {
            return Err(Error::ChunkTooLarge {
                chunk_id,
                size: payload.len(),
                capacity: chunk.capacity(),
            });
        }

        if !chunk.is_published() {
            if chunk.try_claim() {
                self.publish_first(chunk, payload);
                return Ok(());
            }
            // 다른 생산자가 최초 노출을 진행 중
            return Err(Error::ChunkNotReady { chunk_id });
        }

        let slot = self.pool.acquire_spare().ok_or(Error::SurfaceExhausted)?;
        self.pool.write_slot(slot, payload);
        let digest = self.config.digest.compute(payload);
        let old_slot = chunk.swap_slot(slot, payload.len() as u32, digest);
        self.pool.release_slot(old_slot);

        debug!(chunk_id, size = payload.len(), "재노출 완료");
        Ok(())
    }

    /// 청크 메타데이터 조회 (무복사)
    ///
    /// 범위 밖 ID만 None. 미노출 여부는 뷰의 `is_published`로 구분한다.
    pub fn peek(&self, chunk_id: ChunkId) -> Option<crate::chunk::ChunkView> {
        self.chunks.get(chunk_id as usize).map(|c| c.view())
    }

    /// 청크 바이트 복사 (소비자)
    ///
    /// 성공 시에만 pull 카운터가 증가한다. 미노출 청크의 `NotReady`는
    /// dest를 전혀 건드리지 않는다. 재노출 스왑과 겹친 복사본과
    /// verify_on_pull 다이제스트 불일치는 복사 후 판정이라 dest에
    /// 흔적이 남지만 역시 `NotReady`로 보고된다 (재시도 대상).
    pub fn pull(&self, chunk_id: ChunkId, dest: &mut [u8]) -> PullResult {
        let Some(chunk) = self.chunks.get(chunk_id as usize) else {
            return PullResult::NotFound;
        };
        if !chunk.is_published() {
            return PullResult::NotReady;
        }

        let loc = chunk.location_word();
        let (slot, size) = unpack_loc(loc);
        if dest.len() < size as usize {
            return PullResult::BufferTooSmall { needed: size };
        }
        self.pool.read_slot(slot, size as usize, dest);

        // 복사 중 재노출 스왑이 끼어들었으면 이 슬롯은 free 리스트를 거쳐
        // 이미 재활용되었을 수 있다. 위치 워드 재확인으로 그런 복사본을
        // 버린다 (세대 비트가 동일 슬롯 재등장 ABA를 막는다).
        if chunk.location_word() != loc {
            return PullResult::NotReady;
        }

        if self.config.verify_on_pull && self.config.digest != DigestPolicy::None {
            let digest = self.config.digest.compute(&dest[..size as usize]);
            if digest != chunk.digest() {
                // 재노출 스왑과 겹친 희귀 경합 - 재시도 대상으로 보고
                return PullResult::NotReady;
            }
        }

        chunk.record_pull();
        self.total_pulls.fetch_add(1, Ordering::Relaxed);
        PullResult::Pulled(size)
    }

    /// 할당 포함 편의 pull
    ///
    /// None은 범위 밖 또는 미노출 (peek로 구분 가능).
    pub fn pull_bytes(&self, chunk_id: ChunkId) -> Option<Bytes> {
        let chunk = self.chunks.get(chunk_id as usize)?;
        if !chunk.is_published() {
            return None;
        }
        let (_, size) = chunk.location();
        let mut buf = BytesMut::zeroed(size as usize);
        match self.pull(chunk_id, &mut buf) {
            PullResult::Pulled(n) => {
                buf.truncate(n as usize);
                Some(buf.freeze())
            }
            _ => None,
        }
    }

    /// ID별 일괄 pull
    ///
    /// ID와 버퍼를 쌍으로 순회하며, 청크 하나를 부분 복사하는 일은 없다.
    pub fn pull_batch<B: AsMut<[u8]>>(
        &self,
        ids: &[ChunkId],
        dests: &mut [B],
    ) -> Vec<PullResult> {
        ids.iter()
            .zip(dests.iter_mut())
            .map(|(&id, dest)| self.pull(id, dest.as_mut()))
            .collect()
    }

    /// 완료 신호 수동 게양 (멱등)
    ///
    /// 노출 수와 무관하게 "더 이상 노출 없음"을 알린다 (조기 종료 등).
    /// 자동 완료와 동시에 호출되어도 안전하다.
    pub fn raise_red_flag(&self) {
        if !self.red_flag.swap(true, Ordering::AcqRel) {
            info!(
                file_id = %self.manifest.file_id,
                exposed = self.exposed_count(),
                total = self.manifest.total_chunks,
                "red flag 게양"
            );
        }
    }

    /// 완료 여부 (락 프리)
    pub fn is_complete(&self) -> bool {
        self.red_flag.load(Ordering::Acquire)
    }

    /// 아직 미노출인 청크 ID 목록 (소비자측 공백 보고용)
    pub fn missing_chunk_ids(&self) -> Vec<ChunkId> {
        self.chunks
            .iter()
            .filter(|c| !c.is_published())
            .map(|c| c.sequence_id())
            .collect()
    }

    /// 통계 스냅샷 (부작용 없음)
    pub fn stats(&self) -> SurfaceStats {
        SurfaceStats {
            elapsed: self.started_at.elapsed(),
            total_chunks: self.manifest.total_chunks,
            exposed_chunks: self.exposed_count(),
            total_bytes_exposed: self.total_bytes_exposed.load(Ordering::Relaxed),
            total_pulls: self.total_pulls.load(Ordering::Relaxed),
            red_flag_raised: self.is_complete(),
        }
    }
}

impl std::fmt::Debug for ExposureSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExposureSurface")
            .field("file_id", &self.manifest.file_id)
            .field("total_chunks", &self.manifest.total_chunks)
            .field("exposed_count", &self.exposed_count())
            .field("red_flag", &self.is_complete())
            .finish()
    }
}
