//! Heatmap lifecycle controller.
//!
//! Owns the sample cache, association table, sensor registry and restore
//! records. Every mutation runs through `&mut self`, driven by one event loop
//! ([`HeatmapController::step`] or [`HeatmapController::run`]).

pub mod stats;

pub use stats::TypeStats;

use crate::association::{Association, AssociationStore, SpaceRef};
use crate::color::Color;
use crate::config::{HeatmapConfig, HeatmapConfigPatch, SyncSettings};
use crate::error::HeatmapError;
use crate::persistence::AssociationPersistence;
use crate::render::{HeatmapRenderer, RenderReport};
use crate::scene::SceneEngine;
use crate::sensor::{ReadingEvent, Sensor, SensorRegistry, SensorService};
use crate::snapshot::HeatmapSnapshot;
use crate::space::{SpatialElement, SpatialElementIndex};
use crate::sync::{HeatmapSample, RealtimeSync, SampleCache, SyncEvent};
use anyhow::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};


/// Injected host collaborators, released on dispose
#[derive(Clone)]
struct Collaborators {
    scene: Arc<dyn SceneEngine>,
    sensors: Arc<dyn SensorService>,
    persistence: Arc<dyn AssociationPersistence>,
}

pub struct HeatmapController {
    deps: Option<Collaborators>,
    config: HeatmapConfig,
    settings: SyncSettings,
    index: SpatialElementIndex,
    registry: SensorRegistry,
    associations: AssociationStore,
    samples: SampleCache,
    renderer: HeatmapRenderer,
    sync: RealtimeSync,
    last_report: Option<RenderReport>,
    /// Association table changed but the last save failed
    save_pending: bool,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl HeatmapController {
    pub fn new(
        scene: Arc<dyn SceneEngine>,
        sensors: Arc<dyn SensorService>,
        persistence: Arc<dyn AssociationPersistence>,
        mut config: HeatmapConfig,
        settings: SyncSettings,
    ) -> Self {
        config.sanitize();
        let index = SpatialElementIndex::new(&settings.space_category, &settings.reserved_space_prefix);
        let sync = RealtimeSync::new(settings.max_age_ms);

        Self {
            deps: Some(Collaborators {
                scene,
                sensors,
                persistence,
            }),
            config,
            settings,
            index,
            registry: SensorRegistry::new(),
            associations: AssociationStore::new(),
            samples: SampleCache::new(),
            renderer: HeatmapRenderer::new(),
            sync,
            last_report: None,
            save_pending: false,
        }
    }

    fn collaborators(&self) -> Result<Collaborators, HeatmapError> {
        self.deps.clone().ok_or(HeatmapError::Disposed)
    }

    fn poll_interval(&self) -> Option<Duration> {
        self.settings
            .poll_enabled
            .then(|| Duration::from_millis(self.config.update_interval_ms))
    }

    /// Start displaying the heatmap.
    ///
    /// Indexes the loaded models, loads associations, fetches sensors and
    /// renders the first pass. A sensor service that fails or times out is
    /// logged; the next poll tick retries it.
    pub async fn enable(&mut self) -> Result<(), HeatmapError> {
        let deps = self.collaborators()?;
        if self.sync.is_syncing() {
            return Ok(());
        }

        let models = deps.scene.models();
        self.index.refresh(deps.scene.as_ref(), &models);
        self.associations.load(deps.persistence.as_ref()).await;
        self.refresh_sensors(&deps).await;

        let push = if self.settings.push_enabled {
            deps.sensors.subscribe()
        } else {
            None
        };
        self.sync
            .start(push, self.poll_interval(), self.settings.sweep_interval());

        for event in self.registry.latest_events() {
            self.sync.ingest(
                &mut self.samples,
                &self.associations,
                &self.registry,
                &event,
                now_ms(),
            );
        }
        self.sync.request_apply();
        self.flush();

        info!(
            spaces = self.index.len(),
            associations = self.associations.len(),
            sensors = self.registry.len(),
            samples = self.samples.len(),
            "Heatmap enabled"
        );
        Ok(())
    }

    /// Stop syncing and restore every modified element. Idempotent.
    pub fn disable(&mut self) {
        let was_syncing = self.sync.stop();
        if let Some(deps) = &self.deps {
            self.renderer.clear(deps.scene.as_ref());
        }
        self.samples.clear();
        self.last_report = None;
        if was_syncing {
            info!("Heatmap disabled");
        }
    }

    /// Disable and release all state and collaborators. Idempotent.
    pub fn dispose(&mut self) {
        if self.deps.is_none() {
            return;
        }
        self.disable();
        self.index.clear();
        self.registry.clear();
        self.associations.clear();
        self.deps = None;
        info!("Heatmap controller disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.deps.is_none()
    }

    /// Merge a configuration update and re-render when enabled
    pub fn update_config(&mut self, patch: HeatmapConfigPatch) {
        if patch.is_empty() {
            return;
        }
        let previous_interval = self.config.update_interval_ms;
        self.config.merge(patch);
        self.renderer.invalidate_colors();

        if self.sync.is_syncing() {
            if self.config.update_interval_ms != previous_interval {
                self.sync.set_poll_interval(self.poll_interval());
            }
            self.sync.request_apply();
            self.flush();
        }
        debug!(
            scheme = ?self.config.color_scheme,
            opacity = self.config.opacity,
            update_interval_ms = self.config.update_interval_ms,
            "Heatmap config updated"
        );
    }

    /// Wait for the next merged event and process it together with every push
    /// event already queued, rendering at most once.
    ///
    /// Returns false once the controller is disabled.
    pub async fn step(&mut self) -> bool {
        let Some(event) = self.sync.next_event().await else {
            return false;
        };
        self.process(event).await;
        self.sync.is_syncing()
    }

    /// Drive the controller until it is disabled.
    ///
    /// Host commands arrive on `commands`; a closed command channel disables
    /// the heatmap.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<SyncEvent>) {
        while self.sync.is_syncing() {
            let event = tokio::select! {
                biased;

                command = commands.recv() => command.unwrap_or(SyncEvent::Disable),
                event = self.sync.next_event() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            self.process(event).await;
        }
    }

    async fn process(&mut self, event: SyncEvent) {
        self.handle_event(event).await;
        while let Some(push) = self.sync.try_next_push() {
            self.ingest_push(&push);
        }
        self.flush();
    }

    /// Apply one event. Rendering is deferred to the next flush.
    pub async fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::PollTick => self.poll().await,
            SyncEvent::Push(reading) => self.ingest_push(&reading),
            SyncEvent::Sweep => {
                self.sync.sweep(&mut self.samples, now_ms());
            }
            SyncEvent::ConfigChange(patch) => self.update_config(patch),
            SyncEvent::Disable => self.disable(),
        }
    }

    async fn poll(&mut self) {
        let Some(deps) = self.deps.clone() else {
            return;
        };
        if self.save_pending {
            self.persist(&deps).await;
        }
        if !self.refresh_sensors(&deps).await {
            return;
        }
        for event in self.registry.latest_events() {
            self.sync.ingest(
                &mut self.samples,
                &self.associations,
                &self.registry,
                &event,
                now_ms(),
            );
        }
    }

    /// Fetch the sensor listing, bounded by the poll timeout.
    /// Returns false if the service failed or timed out.
    async fn refresh_sensors(&mut self, deps: &Collaborators) -> bool {
        match timeout(self.settings.poll_timeout(), deps.sensors.get_all_sensors()).await {
            Ok(Ok(sensors)) => {
                self.registry.refresh(sensors);
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Sensor service request failed, retrying next tick");
                false
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.poll_timeout_ms,
                    "Sensor service request timed out, retrying next tick"
                );
                false
            }
        }
    }

    fn ingest_push(&mut self, event: &ReadingEvent) {
        self.registry.record(event);
        self.sync.ingest(
            &mut self.samples,
            &self.associations,
            &self.registry,
            event,
            now_ms(),
        );
    }

    fn flush(&mut self) {
        if !self.sync.take_apply() {
            return;
        }
        let Some(deps) = &self.deps else {
            return;
        };
        let report = self.renderer.apply(
            deps.scene.as_ref(),
            &self.samples,
            &self.associations,
            &self.index,
            &self.config,
            now_ms(),
            self.settings.max_age_ms,
        );
        self.last_report = Some(report);
    }

    /// Re-render when enabled, e.g. after an association change
    fn reapply(&mut self) {
        if self.sync.is_syncing() {
            self.sync.request_apply();
            self.flush();
        }
    }

    async fn persist(&mut self, deps: &Collaborators) {
        match self.associations.save(deps.persistence.as_ref()).await {
            Ok(()) => self.save_pending = false,
            Err(e) => {
                warn!(error = %e, "Failed to persist associations, retrying next tick");
                self.save_pending = true;
            }
        }
    }

    /// Drop samples whose sensor is no longer actively linked to their space
    fn prune_unlinked(&mut self) {
        let associations = &self.associations;
        self.samples
            .retain(|s| associations.is_linked(&s.sensor_id, &s.space_guid));
    }

    /// Seed samples for a sensor from its latest known reading
    fn seed_sensor(&mut self, sensor_id: &str) {
        let Some(reading) = self.registry.get(sensor_id).and_then(Sensor::last_reading) else {
            return;
        };
        let event = ReadingEvent::new(sensor_id, reading.value, reading.quality, reading.timestamp);
        self.sync.ingest(
            &mut self.samples,
            &self.associations,
            &self.registry,
            &event,
            now_ms(),
        );
    }

    fn seed_space(&mut self, space_guid: &str) {
        let sensors: Vec<String> = self
            .associations
            .by_space(space_guid)
            .into_iter()
            .map(|a| a.sensor_id.clone())
            .collect();
        for sensor_id in sensors {
            self.seed_sensor(&sensor_id);
        }
    }

    /// Link a sensor to a space, persist the table and re-render
    pub async fn upsert_association(
        &mut self,
        sensor_id: &str,
        space: &SpaceRef,
    ) -> Result<Association, HeatmapError> {
        let deps = self.collaborators()?;
        let association = self.associations.upsert(sensor_id, space)?.clone();
        self.persist(&deps).await;

        self.prune_unlinked();
        self.seed_sensor(sensor_id);
        self.reapply();
        Ok(association)
    }

    pub async fn remove_association(&mut self, association_id: &str) -> Result<Association, HeatmapError> {
        let deps = self.collaborators()?;
        let removed = self.associations.remove(association_id)?;
        self.persist(&deps).await;

        self.prune_unlinked();
        // Another sensor may still cover the space
        self.seed_space(&removed.space_guid);
        self.reapply();
        Ok(removed)
    }

    pub async fn set_association_active(
        &mut self,
        association_id: &str,
        active: bool,
    ) -> Result<(), HeatmapError> {
        let deps = self.collaborators()?;
        self.associations.set_active(association_id, active)?;
        self.persist(&deps).await;

        self.prune_unlinked();
        if let Some(space_guid) = self.associations.get(association_id).map(|a| a.space_guid.clone()) {
            self.seed_space(&space_guid);
        }
        self.reapply();
        Ok(())
    }

    /// Re-index spaces after models were loaded or unloaded
    pub fn refresh_models(&mut self) -> Result<usize, HeatmapError> {
        let deps = self.collaborators()?;
        let models = deps.scene.models();
        let count = self.index.refresh(deps.scene.as_ref(), &models);
        self.renderer.retain_models(&models.into_iter().collect());
        self.reapply();
        Ok(count)
    }

    /// True if any space currently has a sample
    pub fn has_data(&self) -> bool {
        !self.samples.is_empty()
    }

    pub fn stats(&self) -> BTreeMap<String, TypeStats> {
        stats::aggregate(self.samples.iter())
    }

    /// Serialize configuration and associations
    pub fn export_snapshot(&self) -> Result<String> {
        HeatmapSnapshot::new(self.config.clone(), self.associations.all().to_vec()).to_json()
    }

    /// Replace configuration and associations from a snapshot document.
    ///
    /// Invalid documents are rejected without touching the current state.
    pub async fn import_snapshot(&mut self, json: &str) -> Result<(), HeatmapError> {
        let deps = self.collaborators()?;
        let snapshot = HeatmapSnapshot::from_json(json)?;

        let previous_interval = self.config.update_interval_ms;
        self.config = snapshot.config;
        self.associations.replace_all(snapshot.associations);
        self.renderer.invalidate_colors();
        self.persist(&deps).await;

        self.prune_unlinked();
        for event in self.registry.latest_events() {
            self.sync.ingest(
                &mut self.samples,
                &self.associations,
                &self.registry,
                &event,
                now_ms(),
            );
        }
        if self.sync.is_syncing() && self.config.update_interval_ms != previous_interval {
            self.sync.set_poll_interval(self.poll_interval());
        }
        self.reapply();

        info!(
            associations = self.associations.len(),
            "Heatmap snapshot imported"
        );
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.sync.is_syncing()
    }

    pub fn sample(&self, space_guid: &str) -> Option<&HeatmapSample> {
        self.samples.get(space_guid)
    }

    pub fn samples(&self) -> impl Iterator<Item = &HeatmapSample> {
        self.samples.iter()
    }

    pub fn associations(&self) -> &[Association] {
        self.associations.all()
    }

    /// Color last rendered for a space
    pub fn space_color(&self, space_guid: &str) -> Option<Color> {
        self.renderer.color_for(space_guid)
    }

    pub fn spaces(&self) -> impl Iterator<Item = &SpatialElement> {
        self.index.elements()
    }

    pub fn sensor(&self, sensor_id: &str) -> Option<&Sensor> {
        self.registry.get(sensor_id)
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.config
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn last_report(&self) -> Option<RenderReport> {
        self.last_report
    }

    /// Number of elements the heatmap currently modifies
    pub fn modified_elements(&self) -> usize {
        self.renderer.record_count()
    }
}

impl Drop for HeatmapController {
    fn drop(&mut self) {
        self.dispose();
    }
}
