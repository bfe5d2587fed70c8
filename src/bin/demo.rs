//! ESP 데모 - 인프로세스 생산자/소비자 구동
//!
//! 표면 하나를 만들고, 생산자 워커들이 분리된 ID 범위를 병렬 노출하는
//! 동안 소비자 스레드들이 폴링 pull로 전체 데이터를 검증 조립한다.
//!
//! 사용법:
//!   cargo run --release --bin esp-demo -- [OPTIONS]
//!
//! 예시:
//!   # 기본 구동 (16MB 랜덤 데이터)
//!   cargo run --release --bin esp-demo
//!
//!   # 64MB, 소비자 8, 복구 모드
//!   cargo run --release --bin esp-demo -- --size 67108864 --consumers 8 --recovery

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use esp::{ChunkId, ExposureSurface, Manifest, PullResult, SurfaceConfig, SurfaceRegistry};

/// 데모 설정
struct DemoConfig {
    /// 데이터 크기 (바이트)
    data_size: usize,

    /// 청크 크기 (바이트)
    chunk_size: u32,

    /// 생산자 워커 수
    producers: usize,

    /// 소비자 스레드 수
    consumers: usize,

    /// 복구(재노출) 모드 활성화
    recovery: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            data_size: 16 * 1024 * 1024, // 16MB
            chunk_size: 65536,
            producers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            consumers: 4,
            recovery: false,
        }
    }
}

fn parse_args() -> DemoConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = DemoConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--size" | "-s" => {
                if i + 1 < args.len() {
                    config.data_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--chunk-size" => {
                if i + 1 < args.len() {
                    config.chunk_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--producers" | "-p" => {
                if i + 1 < args.len() {
                    config.producers = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--consumers" | "-c" => {
                if i + 1 < args.len() {
                    config.consumers = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--recovery" | "-r" => {
                config.recovery = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"ESP Demo - 노출 표면 인프로세스 구동

생산자 워커들이 분리된 ID 범위를 병렬 노출하고, 소비자 스레드들이
폴링 pull로 데이터를 검증 조립한다.

사용법:
  cargo run --release --bin esp-demo -- [OPTIONS]

옵션:
  -s, --size <BYTES>      데이터 크기 (기본: 16MB)
  -p, --producers <N>     생산자 워커 수 (기본: CPU 코어 수)
  -c, --consumers <N>     소비자 스레드 수 (기본: 4)
  -r, --recovery          복구(재노출) 모드 활성화
  --chunk-size <SIZE>     청크 크기 바이트 (기본: 65536)
  -h, --help              이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

/// 소비자 하나가 검증한 (청크 수, 바이트 수)
struct ConsumerReport {
    consumer_id: usize,
    chunks_pulled: u64,
    bytes_pulled: u64,
    not_ready_polls: u64,
}

/// 소비자: red flag가 오를 때까지 전 청크를 폴링 pull하며 바이트 검증
fn run_consumer(
    consumer_id: usize,
    surface: Arc<ExposureSurface>,
    data: Arc<Vec<u8>>,
) -> ConsumerReport {
    let total = surface.total_chunks();
    let chunk_size = surface.manifest().chunk_size as usize;
    let mut dest = vec![0u8; chunk_size];
    let mut pulled = vec![false; total as usize];
    let mut report = ConsumerReport {
        consumer_id,
        chunks_pulled: 0,
        bytes_pulled: 0,
        not_ready_polls: 0,
    };

    while report.chunks_pulled < total as u64 {
        for id in 0..total {
            if pulled[id as usize] {
                continue;
            }
            match surface.pull(id, &mut dest) {
                PullResult::Pulled(size) => {
                    let offset = surface.manifest().chunk_offset(id) as usize;
                    assert_eq!(
                        &dest[..size as usize],
                        &data[offset..offset + size as usize],
                        "청크 {} 바이트 불일치",
                        id
                    );
                    pulled[id as usize] = true;
                    report.chunks_pulled += 1;
                    report.bytes_pulled += size as u64;
                }
                PullResult::NotReady => {
                    report.not_ready_polls += 1;
                }
                other => panic!("예상 밖 pull 결과: {:?}", other),
            }
        }
        // 폴링 간격은 호출자 정책 - 데모는 짧은 sleep
        if report.chunks_pulled < total as u64 {
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    report
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let demo = parse_args();

    info!("ESP Demo starting...");
    info!("Data size: {} bytes", demo.data_size);
    info!("Chunk size: {} bytes", demo.chunk_size);
    info!("Producers: {} / Consumers: {}", demo.producers, demo.consumers);

    // 테스트 데이터 준비
    let mut data = vec![0u8; demo.data_size];
    rand::thread_rng().fill_bytes(&mut data);
    let data = Arc::new(data);

    // 표면 생성 + 등록
    let manifest = Manifest::for_data("demo-transfer", &data, demo.chunk_size)?;
    let surface_config = if demo.recovery {
        SurfaceConfig::recoverable()
    } else {
        SurfaceConfig::default()
    };

    let registry = SurfaceRegistry::new();
    let surface = registry.create(manifest, surface_config)?;
    let total_chunks = surface.total_chunks();
    info!("Total chunks: {}", total_chunks);

    // 소비자 스레드: 노출과 동시에 폴링 시작
    let (report_tx, report_rx) = crossbeam_channel::unbounded::<ConsumerReport>();
    let consumer_handles: Vec<_> = (0..demo.consumers)
        .map(|id| {
            let surface = surface.clone();
            let data = data.clone();
            let tx = report_tx.clone();
            std::thread::spawn(move || {
                let report = run_consumer(id, surface, data);
                let _ = tx.send(report);
            })
        })
        .collect();
    drop(report_tx);

    // 생산자: rayon 풀에서 워커별 분리 ID 범위를 병렬 노출
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(demo.producers)
        .build()?;
    let chunk_size = demo.chunk_size as usize;

    pool.install(|| {
        rayon::scope(|scope| {
            let per_worker = (total_chunks as usize + demo.producers - 1) / demo.producers;
            for worker in 0..demo.producers {
                let surface = &surface;
                let data = &data;
                scope.spawn(move |_| {
                    let start = worker * per_worker;
                    let end = ((worker + 1) * per_worker).min(total_chunks as usize);
                    for id in start..end {
                        let offset = id * chunk_size;
                        let limit = (offset + chunk_size).min(data.len());
                        assert!(surface.expose(id as ChunkId, &data[offset..limit]));
                    }
                });
            }
        })
    });

    info!("노출 완료, red flag: {}", surface.is_complete());

    // 복구 모드면 임의 청크 하나를 재노출해 스왑 경로 시연
    if demo.recovery && total_chunks > 0 {
        let victim: ChunkId = rand::random::<u32>() % total_chunks;
        let offset = surface.manifest().chunk_offset(victim) as usize;
        let limit = (offset + chunk_size).min(data.len());
        surface.re_expose(victim, &data[offset..limit])?;
        info!("청크 {} 재노출 (슬롯 스왑)", victim);
    }

    // 소비자 보고 수집
    for handle in consumer_handles {
        handle.join().expect("소비자 스레드 패닉");
    }
    while let Ok(report) = report_rx.recv() {
        info!(
            "Consumer {}: {} chunks / {} bytes / {} not-ready polls",
            report.consumer_id, report.chunks_pulled, report.bytes_pulled, report.not_ready_polls
        );
    }

    let stats = surface.stats();
    info!("{}", stats.summary());
    assert!(surface.is_complete());
    assert!(surface.missing_chunk_ids().is_empty());

    registry.remove("demo-transfer");
    info!("ESP Demo finished");

    Ok(())
}
