use lanestep_shared::{LaneConfig, LaneKind, MasterConfig, PatternSnapshot};

/// Control-side requests, drained by the audio thread at the top of each block.
/// Every variant is plain data so sending never hands the audio thread
/// anything to free.
#[derive(Debug, Clone, Copy)]
pub enum EngineCommand {
    SetMaster(MasterConfig),
    SetLane { lane: LaneKind, config: LaneConfig },
    /// Replaces master and lanes at once and resets every cursor.
    ReplaceAll(PatternSnapshot),
    /// Cursor-only reset; the values are sent separately.
    ResetLane(LaneKind),
    ResetAll,
    SetLaneValueIndex { lane: LaneKind, step: usize },
    SetLaneTriggerIndex { lane: LaneKind, step: usize },
    SetGlobalStepIndex(usize),
    SyncLaneToBar(LaneKind),
    SyncAllToBar,
    AllNotesOff,
}

/// Audio-thread notifications back to the control side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFeedback {
    PatternLoaded { bank: usize, slot: usize },
    TransportStarted,
    TransportStopped,
}
