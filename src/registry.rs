//! 표면 레지스트리
//!
//! file_id로 활성 표면을 찾는 인프로세스 맵. 업로드/다운로드 프런트엔드가
//! 표면을 공유하는 단일 진입점이며, 엔진 자체는 이 맵 없이도 동작한다.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::config::SurfaceConfig;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::surface::ExposureSurface;

/// file_id -> 표면 맵
#[derive(Debug, Default)]
pub struct SurfaceRegistry {
    surfaces: DashMap<String, Arc<ExposureSurface>>,
}

impl SurfaceRegistry {
    /// 빈 레지스트리 생성
    pub fn new() -> Self {
        Self {
            surfaces: DashMap::new(),
        }
    }

    /// 매니페스트로 표면 생성 + 등록
    ///
    /// 같은 file_id가 이미 있으면 `DuplicateSurface`.
    pub fn create(
        &self,
        manifest: Manifest,
        config: SurfaceConfig,
    ) -> Result<Arc<ExposureSurface>> {
        let file_id = manifest.file_id.clone();
        if self.surfaces.contains_key(&file_id) {
            return Err(Error::DuplicateSurface { file_id });
        }

        let surface = Arc::new(ExposureSurface::with_config(manifest, config)?);
        // contains_key 이후 경합 시 먼저 들어간 쪽 유지
        match self.surfaces.entry(file_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(Error::DuplicateSurface { file_id })
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(surface.clone());
                Ok(surface)
            }
        }
    }

    /// 표면 조회
    pub fn get(&self, file_id: &str) -> Option<Arc<ExposureSurface>> {
        self.surfaces.get(file_id).map(|s| s.clone())
    }

    /// 표면 등록 해제 (해제 = 마지막 Arc가 떨어질 때 풀/테이블 일괄 반환)
    ///
    /// 없는 file_id는 None, 에러 아님.
    pub fn remove(&self, file_id: &str) -> Option<Arc<ExposureSurface>> {
        let removed = self.surfaces.remove(file_id).map(|(_, s)| s);
        if removed.is_some() {
            info!(file_id, "표면 등록 해제");
        }
        removed
    }

    /// 완료된(red flag) 표면 일괄 제거, 제거 수 반환
    pub fn purge_complete(&self) -> usize {
        let before = self.surfaces.len();
        self.surfaces.retain(|_, surface| !surface.is_complete());
        before - self.surfaces.len()
    }

    /// 등록된 file_id 목록
    pub fn ids(&self) -> Vec<String> {
        self.surfaces.iter().map(|e| e.key().clone()).collect()
    }

    /// 등록된 표면 수
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_get_remove() {
        let registry = SurfaceRegistry::new();
        let manifest = Manifest::new("file-a", 1024, 256).unwrap();
        let surface = registry
            .create(manifest, SurfaceConfig::default())
            .unwrap();
        assert_eq!(registry.len(), 1);

        let found = registry.get("file-a").unwrap();
        assert_eq!(found.total_chunks(), surface.total_chunks());

        assert!(registry.remove("file-a").is_some());
        assert!(registry.remove("file-a").is_none()); // 부재는 에러 아님
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = SurfaceRegistry::new();
        let manifest = Manifest::new("file-dup", 1024, 256).unwrap();
        registry
            .create(manifest.clone(), SurfaceConfig::default())
            .unwrap();

        assert!(matches!(
            registry.create(manifest, SurfaceConfig::default()),
            Err(Error::DuplicateSurface { .. })
        ));
    }

    #[test]
    fn test_purge_complete() {
        let registry = SurfaceRegistry::new();
        for name in ["one", "two", "three"] {
            let manifest = Manifest::new(name, 256, 256).unwrap();
            registry.create(manifest, SurfaceConfig::default()).unwrap();
        }

        registry.get("two").unwrap().expose(0, &[7u8; 256]);
        assert!(registry.get("two").unwrap().is_complete());

        assert_eq!(registry.purge_complete(), 1);
        assert_eq!(registry.len(), 2);
        assert!(registry.get("two").is_none());
    }
}
