use crate::light::LightId;
use crate::work_list::{LightPipeline, WorkList, WorkListId, SHADOW_DATA_STAGE};

pub const WORK_LIST_NAME: &str = "Shadow data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookState {
    #[default]
    Detached,
    Attached { light: LightId, work_list: WorkListId },
}

/// Tracks the single work-list this component keeps attached to a light.
#[derive(Debug, Default)]
pub struct HookController {
    state: HookState,
}

impl HookController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> HookState {
        self.state
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.state, HookState::Attached { .. })
    }

    pub fn attached_light(&self) -> Option<LightId> {
        match self.state {
            HookState::Attached { light, .. } => Some(light),
            HookState::Detached => None,
        }
    }

    /// Attaches a fresh empty work-list to `light`. A hook on another light is detached first,
    /// and a list the host has dropped is replaced.
    pub fn attach<P>(&mut self, pipeline: &mut P, light: LightId) -> WorkListId
    where
        P: LightPipeline + ?Sized,
    {
        if let HookState::Attached { light: current, work_list } = self.state {
            if current == light {
                if pipeline.work_list_mut(work_list).is_some() {
                    return work_list;
                }
                log::warn!(
                    "[shadow] work-list #{} for light {light} was dropped by the host, reattaching",
                    work_list.raw()
                );
                self.state = HookState::Detached;
            } else {
                self.detach(pipeline);
            }
        }
        let work_list = pipeline.attach(light, SHADOW_DATA_STAGE, WorkList::new(WORK_LIST_NAME));
        log::debug!(
            "[shadow] attached work-list #{} to light {light} at {}",
            work_list.raw(),
            SHADOW_DATA_STAGE.label()
        );
        self.state = HookState::Attached { light, work_list };
        work_list
    }

    /// Returns true when a hook was attached.
    pub fn detach<P>(&mut self, pipeline: &mut P) -> bool
    where
        P: LightPipeline + ?Sized,
    {
        match std::mem::take(&mut self.state) {
            HookState::Attached { light, work_list } => {
                if pipeline.detach(light, SHADOW_DATA_STAGE, work_list).is_none() {
                    log::debug!("[shadow] work-list for light {light} was already removed by the host");
                }
                true
            }
            HookState::Detached => false,
        }
    }

    /// The attached work-list, if the host still holds it. A vanished list resets the hook.
    pub fn work_list<'p, P>(&mut self, pipeline: &'p mut P) -> Option<&'p mut WorkList>
    where
        P: LightPipeline + ?Sized,
    {
        let HookState::Attached { work_list, .. } = self.state else {
            return None;
        };
        let list = pipeline.work_list_mut(work_list);
        if list.is_none() {
            log::warn!("[shadow] attached work-list disappeared from the host pipeline");
            self.state = HookState::Detached;
        }
        list
    }
}
