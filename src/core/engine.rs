// src/core/engine.rs
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AtlasError;
use super::{
    load_sources, render_change_report, render_reconcile_summary, render_tree,
    CallActivityResolver, ChangeReport, ElementExtractor, Hierarchy, HierarchyAssembler,
    MapReconciler, MapValidator, NamingConvention, ProcessMap, ReconcileReport, FileSet, Snapshot,
    StructuralDiffer, Warning,
};

/// Output of the extract -> resolve -> reconcile pipeline over one file set
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub snapshot: Snapshot,
    pub report: ReconcileReport,
}

/// Run the pure pipeline over already loaded sources. No I/O.
pub fn reconcile_sources(
    config: &Config,
    sources: &BTreeMap<String, String>,
    root_file: &str,
    prior: Option<&ProcessMap>,
) -> crate::error::Result<PipelineOutput> {
    if sources.is_empty() {
        return Err(AtlasError::NoFiles);
    }

    let mut snapshot = Snapshot::from_sources(&ElementExtractor::new(), sources);
    let resolver = CallActivityResolver::new(NamingConvention::new(&config.resolution, root_file));
    let links = resolver.resolve_all(&snapshot.files, prior);

    let mut report = MapReconciler::new(root_file).reconcile(&snapshot.files, links, prior)?;

    // Extraction warnings lead the list
    let mut warnings = std::mem::take(&mut snapshot.warnings);
    warnings.append(&mut report.warnings);
    report.warnings = warnings;

    snapshot.map = Some(report.map.clone());
    Ok(PipelineOutput { snapshot, report })
}

/// Main orchestration engine
pub struct Engine {
    config: Config,
    differ: StructuralDiffer,
    assembler: HierarchyAssembler,
}

impl Engine {
    /// Create a new engine instance
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;

        debug!("Loaded configuration: {:?}", config);

        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        let assembler = HierarchyAssembler::new(config.hierarchy.max_depth);
        Self {
            config,
            differ: StructuralDiffer::new(),
            assembler,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write a default configuration file
    pub async fn init(&mut self, path: Option<PathBuf>, root: Option<String>) -> Result<()> {
        let target_dir = path.unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&target_dir)?;

        let config_path = target_dir.join("bpmn-atlas.toml");
        if config_path.exists() {
            warn!("⚠️ {} already exists, leaving it untouched", config_path.display());
            return Ok(());
        }

        let mut config = Config::default();
        config.project.root_file = root;
        config.save(&config_path)?;
        std::fs::create_dir_all(target_dir.join(&config.project.bpmn_dir))?;

        info!("✅ Wrote {}", config_path.display());
        self.config = config;
        Ok(())
    }

    /// Extract, resolve and reconcile the file set, then replace the persisted map
    pub async fn map(
        &mut self,
        dir: Option<PathBuf>,
        root: Option<String>,
        dry_run: bool,
        fail_on_review: bool,
    ) -> Result<ReconcileReport> {
        let dir = dir.unwrap_or_else(|| self.config.project.bpmn_dir.clone());
        let root_file = self.root_file(root)?;

        info!("🔍 Reconciling {} (root: {})", dir.display(), root_file);

        let sources = self.load(&dir)?;
        let prior = ProcessMap::load(&self.config.project.map_file)?;
        if prior.is_none() {
            info!("No persisted map at {}; first run", self.config.project.map_file.display());
        }

        let output = reconcile_sources(&self.config, &sources, &root_file, prior.as_ref())?;
        let report = output.report;

        for warning in &report.warnings {
            warn!("{}", warning);
        }
        println!("{}", render_reconcile_summary(&report));

        if dry_run {
            info!("Dry run: {} left untouched", self.config.project.map_file.display());
        } else {
            report.map.save_atomic(&self.config.project.map_file)?;
            info!("✅ Wrote {}", self.config.project.map_file.display());
        }

        let pending_review = report.map.links().filter(|l| l.needs_manual_review).count();
        if fail_on_review && pending_review > 0 {
            anyhow::bail!("{} call activity link(s) need manual review", pending_review);
        }

        Ok(report)
    }

    /// Diff two versions of the file set
    pub async fn diff(&mut self, old: PathBuf, new: PathBuf, output: Option<PathBuf>) -> Result<ChangeReport> {
        info!("🔍 Comparing {} -> {}", old.display(), new.display());

        let root_file = self.config.project.root_file.clone();
        let old_sources = self.load(&old)?;
        let new_sources = self.load(&new)?;

        let (old_snapshot, _) = self.snapshot_with_map(&old_sources, root_file.as_deref(), None);
        let (new_snapshot, warnings) =
            self.snapshot_with_map(&new_sources, root_file.as_deref(), old_snapshot.map.as_ref());

        let report = self.differ.compare_snapshots(&old_snapshot, &new_snapshot, warnings);
        info!(
            "📊 {} added, {} removed, {} modified, {} unchanged",
            report.summary.added, report.summary.removed, report.summary.modified, report.summary.unchanged
        );

        let (rendered, extension) = match self.config.output.format.as_str() {
            "json" => (serde_json::to_string_pretty(&report)?, "json"),
            _ => (
                render_change_report(&report, &self.config.project.name, &chrono::Utc::now().to_rfc3339()),
                "md",
            ),
        };

        let path = output.unwrap_or_else(|| {
            self.config
                .output
                .reports_dir
                .join(format!("change-report.{}", extension))
        });
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, rendered)?;
        info!("✅ Change report: {}", path.display());

        Ok(report)
    }

    /// Assemble the hierarchy from the persisted map, or a fresh one if none exists
    pub async fn tree(&mut self, dir: Option<PathBuf>, root: Option<String>, json: bool) -> Result<Hierarchy> {
        let dir = dir.unwrap_or_else(|| self.config.project.bpmn_dir.clone());
        let root_file = self.root_file(root)?;
        let sources = self.load(&dir)?;

        let map = match ProcessMap::load(&self.config.project.map_file)? {
            Some(map) => {
                let files = FileSet::new(sources.keys().cloned());
                let validation = MapValidator::new(root_file.clone()).validate(&map, &files);
                for warning in &validation.warnings {
                    warn!("{}", warning);
                }
                map
            }
            None => {
                info!("No persisted map; reconciling {} in memory", dir.display());
                reconcile_sources(&self.config, &sources, &root_file, None)?.report.map
            }
        };

        let hierarchy = self.assembler.assemble(&map, &root_file)?;
        for warning in &hierarchy.warnings {
            warn!("{}", warning);
        }

        if json {
            println!("{}", serde_json::to_string_pretty(&hierarchy)?);
        } else {
            print!("{}", render_tree(&hierarchy));
        }

        Ok(hierarchy)
    }

    fn root_file(&self, root: Option<String>) -> Result<String> {
        root.or_else(|| self.config.project.root_file.clone())
            .ok_or_else(|| {
                AtlasError::Config("no root file given; pass --root or set project.root_file".to_string())
                    .into()
            })
    }

    fn load(&self, dir: &Path) -> Result<BTreeMap<String, String>> {
        let sources = load_sources(
            dir,
            &self.config.resolution.file_extension,
            &self.config.project.ignore_patterns,
        )?;
        if sources.is_empty() {
            return Err(AtlasError::NoFiles.into());
        }
        Ok(sources)
    }

    /// Snapshot plus reconciled map; without a usable root the snapshot
    /// carries no map and the diff compares structure only.
    fn snapshot_with_map(
        &self,
        sources: &BTreeMap<String, String>,
        root_file: Option<&str>,
        prior: Option<&ProcessMap>,
    ) -> (Snapshot, Vec<Warning>) {
        let Some(root_file) = root_file else {
            let snapshot = Snapshot::from_sources(&ElementExtractor::new(), sources);
            let warnings = snapshot.warnings.clone();
            return (snapshot, warnings);
        };

        match reconcile_sources(&self.config, sources, root_file, prior) {
            Ok(output) => (output.snapshot, output.report.warnings),
            Err(e) => {
                warn!("⚠️ Comparing without link data: {}", e);
                let snapshot = Snapshot::from_sources(&ElementExtractor::new(), sources);
                let warnings = snapshot.warnings.clone();
                (snapshot, warnings)
            }
        }
    }
}
