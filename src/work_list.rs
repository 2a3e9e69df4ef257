//! Deferred GPU work-lists and the host hook points they are inserted at.

use crate::dispatch::DispatchParameters;
use crate::light::LightId;
use crate::texture_pair::ArraySlot;

/// Insertion points in a directional light's rendering sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightStage {
    BeforeShadowMap,
    AfterShadowMap,
    BeforeScreenspaceMask,
    AfterScreenspaceMask,
}

impl LightStage {
    pub fn label(self) -> &'static str {
        match self {
            LightStage::BeforeShadowMap => "BeforeShadowMap",
            LightStage::AfterShadowMap => "AfterShadowMap",
            LightStage::BeforeScreenspaceMask => "BeforeScreenspaceMask",
            LightStage::AfterScreenspaceMask => "AfterScreenspaceMask",
        }
    }
}

/// After the light's shadow maps exist and before the mask that shading consumes is composed.
pub const SHADOW_DATA_STAGE: LightStage = LightStage::BeforeScreenspaceMask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkListId(u64);

impl WorkListId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// One compute dispatch writing cascade `params.cascade` of `target` from history in `source`.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchCommand {
    pub params: DispatchParameters,
    pub source: ArraySlot,
    pub target: ArraySlot,
}

#[derive(Debug, Clone, Default)]
pub struct WorkList {
    name: String,
    dispatches: Vec<DispatchCommand>,
}

impl WorkList {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), dispatches: Vec::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clear(&mut self) {
        self.dispatches.clear();
    }

    pub fn push_dispatch(&mut self, command: DispatchCommand) {
        self.dispatches.push(command);
    }

    pub fn dispatches(&self) -> &[DispatchCommand] {
        &self.dispatches
    }

    pub fn len(&self) -> usize {
        self.dispatches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty()
    }
}

/// The host side of light hooks: owns attached work-lists and runs them at their stage.
pub trait LightPipeline {
    fn attach(&mut self, light: LightId, stage: LightStage, list: WorkList) -> WorkListId;
    fn detach(&mut self, light: LightId, stage: LightStage, id: WorkListId) -> Option<WorkList>;
    fn work_list_mut(&mut self, id: WorkListId) -> Option<&mut WorkList>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Attached { light: LightId, stage: LightStage, id: WorkListId },
    Detached { light: LightId, stage: LightStage, id: WorkListId },
}

#[derive(Debug)]
struct HookEntry {
    id: WorkListId,
    light: LightId,
    stage: LightStage,
    list: WorkList,
}

/// Work-lists attached per `(light, stage)`, with a log of every attach and detach call.
#[derive(Debug, Default)]
pub struct LightHookTable {
    next_id: u64,
    entries: Vec<HookEntry>,
    events: Vec<HookEvent>,
}

impl LightHookTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Work-lists to execute when `light` reaches `stage`, in attach order.
    pub fn work_lists(&self, light: LightId, stage: LightStage) -> impl Iterator<Item = &WorkList> + '_ {
        self.entries
            .iter()
            .filter(move |entry| entry.light == light && entry.stage == stage)
            .map(|entry| &entry.list)
    }

    pub fn attached_count(&self, light: LightId) -> usize {
        self.entries.iter().filter(|entry| entry.light == light).count()
    }

    pub fn total_attached(&self) -> usize {
        self.entries.len()
    }

    pub fn events(&self) -> &[HookEvent] {
        &self.events
    }
}

impl LightPipeline for LightHookTable {
    fn attach(&mut self, light: LightId, stage: LightStage, list: WorkList) -> WorkListId {
        self.next_id += 1;
        let id = WorkListId(self.next_id);
        self.entries.push(HookEntry { id, light, stage, list });
        self.events.push(HookEvent::Attached { light, stage, id });
        id
    }

    fn detach(&mut self, light: LightId, stage: LightStage, id: WorkListId) -> Option<WorkList> {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.id == id && entry.light == light && entry.stage == stage)?;
        self.events.push(HookEvent::Detached { light, stage, id });
        Some(self.entries.remove(position).list)
    }

    fn work_list_mut(&mut self, id: WorkListId) -> Option<&mut WorkList> {
        self.entries.iter_mut().find(|entry| entry.id == id).map(|entry| &mut entry.list)
    }
}
