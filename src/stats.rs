//! 표면 통계
//!
//! `ExposureSurface::stats()`가 만드는 부작용 없는 스냅샷.

use std::time::Duration;

/// 표면 통계 스냅샷
#[derive(Debug, Clone)]
pub struct SurfaceStats {
    /// 표면 생성 이후 경과 시간
    pub elapsed: Duration,

    /// 총 청크 수
    pub total_chunks: u32,

    /// 노출된 청크 수
    pub exposed_chunks: u32,

    /// 노출된 총 바이트
    pub total_bytes_exposed: u64,

    /// 누적 pull 수
    pub total_pulls: u64,

    /// 완료 신호 여부
    pub red_flag_raised: bool,
}

impl SurfaceStats {
    /// 노출 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.total_bytes_exposed as f64 / elapsed
    }

    /// 노출 처리율 (MB/sec)
    pub fn throughput_mbps(&self) -> f64 {
        self.throughput() / (1024.0 * 1024.0)
    }

    /// 노출 진행률 (0.0 ~ 1.0)
    pub fn progress_ratio(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        self.exposed_chunks as f64 / self.total_chunks as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Chunks: {}/{} | Bytes: {} | Throughput: {:.2} MB/s | Pulls: {} | RedFlag: {}",
            self.elapsed.as_secs_f64(),
            self.exposed_chunks,
            self.total_chunks,
            self.total_bytes_exposed,
            self.throughput_mbps(),
            self.total_pulls,
            self.red_flag_raised,
        )
    }
}
