// Key names of the nested summary mapping.  Report consumers depend on these spellings.

// Generic, shared by several log types.

pub const PBS_VERSION: &str = "pbs_version";
pub const JOB_ID: &str = "job_id";
pub const JOB_RUN_RATE: &str = "job_run_rate";
pub const JOB_SUBMIT_RATE: &str = "job_submit_rate";
pub const JOB_END_RATE: &str = "job_end_rate";
pub const JOB_THROUGHPUT: &str = "job_throughput";
pub const NUM_JOBS_QUEUED: &str = "num_jobs_queued";
pub const NUM_JOBS_RUN: &str = "num_jobs_run";
pub const NUM_JOBS_ENDED: &str = "num_jobs_ended";
pub const DURATION: &str = "duration";

// Server.

pub const NODE_UP_RATE: &str = "node_up_rate";

// Scheduler cycles.

pub const NUM_CYCLES: &str = "num_cycles";
pub const CYCLE_DURATION_MIN: &str = "cycle_duration_min";
pub const CYCLE_DURATION_MAX: &str = "cycle_duration_max";
pub const CYCLE_DURATION_MEAN: &str = "cycle_duration_mean";
pub const CYCLE_DURATION_25P: &str = "cycle_duration_25p";
pub const CYCLE_DURATION_MEDIAN: &str = "cycle_duration_median";
pub const CYCLE_DURATION_75P: &str = "cycle_duration_75p";
pub const MIN_CYCLE_TIME: &str = "min_cycle_time";
pub const MAX_CYCLE_TIME: &str = "max_cycle_time";
pub const CYCLE_START_TIME: &str = "cycle_start_time";
pub const CYCLE_DURATION: &str = "cycle_duration";
pub const QUERY_DURATION: &str = "query_duration";
pub const NUM_JOBS_CONSIDERED: &str = "num_jobs_considered";
pub const NUM_JOBS_FAILED_TO_RUN: &str = "num_jobs_failed_to_run";
pub const SCHEDULER_SOLVER_TIME: &str = "scheduler_solver_time";
pub const NUM_JOBS_CALENDARED: &str = "num_jobs_calendared";
pub const NUM_JOBS_FAILED_TO_PREEMPT: &str = "num_jobs_failed_to_preempt";
pub const NUM_JOBS_PREEMPTED: &str = "num_jobs_preempted";
pub const TIME_TO_RUN: &str = "time_to_run";
pub const TIME_TO_DISCARD: &str = "time_to_discard";
pub const TIME_IN_SCHED: &str = "time_in_sched";
pub const TIME_TO_CALENDAR: &str = "time_to_calendar";
pub const JOBS: &str = "jobs";
pub const SUMMARY: &str = "summary";

// Estimated start times.

pub const ESTIMATES: &str = "estimates";
pub const ESTIMATED_JOBS: &str = "estimated_jobs";
pub const ESTIMATED: &str = "estimated";
pub const DRIFT_DURATION_MIN: &str = "drift_duration_min";
pub const DRIFT_DURATION_MAX: &str = "drift_duration_max";
pub const DRIFT_DURATION_MEAN: &str = "drift_duration_mean";
pub const DRIFT_DURATION_MEDIAN: &str = "drift_duration_median";
pub const NUM_DRIFTS: &str = "num_drifts";
pub const NUM_JOBS_DRIFTED: &str = "num_jobs_drifted";
pub const NUM_JOBS_NO_DRIFT: &str = "num_jobs_no_drift";
pub const NUM_ESTIMATES: &str = "num_estimates";
pub const JOB_DRIFT_DURATION: &str = "job_drift_duration";
pub const ESTIMATED_START_TIME_RANGE: &str = "estimated_start_time_range";
pub const ESTIMATED_START_TIME_ACCURACY: &str = "estimated_start_time_accuracy";
pub const JOB_START_TIME: &str = "job_start_time";
pub const ESTIMATED_START_TIME_SUMMARY: &str = "estimated_start_time_summary";
pub const DRIFTED_SUB_15MN: &str = "drifted_sub_15mn";
pub const DRIFTED_SUB_1HR: &str = "drifted_sub_1hr";
pub const DRIFTED_SUB_3HR: &str = "drifted_sub_3hr";
pub const DRIFTED_OVER_3HR: &str = "drifted_over_3hr";

// Accounting.

pub const CPU_HOURS: &str = "cpu_hours";
pub const NODE_HOURS: &str = "node_hours";
pub const UNIQUE_USERS: &str = "unique_users";
pub const UTILIZATION_NCPUS: &str = "utilization_ncpus";
pub const UTILIZATION_NODES: &str = "utilization_nodes";
pub const PARSER_ERRORS: &str = "parser_errors";
pub const WORKLOAD: &str = "workload";
pub const JOB_INFO: &str = "job_info";

// Custom and conditional matching.

pub const CUSTOM_INTERVAL: &str = "custom_interval";
pub const INIT_TIME: &str = "init_time";
pub const CUSTOM_FREQ: &str = "custom_freq";
pub const CUSTOM_FREQ_COUNTS: &str = "custom_freq_counts";
pub const CUSTOM_GROUPS: &str = "custom_groups";
pub const NUM_CONDITIONAL_MATCHES: &str = "num_conditional_matches";
pub const MATCHES: &str = "matches";

/// The six keys of one min/25p/median/mean/75p/max ladder.

pub struct LadderKeys {
    pub min: &'static str,
    pub p25: &'static str,
    pub median: &'static str,
    pub mean: &'static str,
    pub p75: &'static str,
    pub max: &'static str,
}

pub const JOB_WAIT_TIME: LadderKeys = LadderKeys {
    min: "job_wait_time_min",
    p25: "job_wait_time_25p",
    median: "job_wait_time_median",
    mean: "job_wait_time_mean",
    p75: "job_wait_time_75p",
    max: "job_wait_time_max",
};

pub const JOB_RUN_TIME: LadderKeys = LadderKeys {
    min: "job_run_time_min",
    p25: "job_run_time_25p",
    median: "job_run_time_median",
    mean: "job_run_time_mean",
    p75: "job_run_time_75p",
    max: "job_run_time_max",
};

pub const JOB_NODE_SIZE: LadderKeys = LadderKeys {
    min: "job_node_size_min",
    p25: "job_node_size_25p",
    median: "job_node_size_median",
    mean: "job_node_size_mean",
    p75: "job_node_size_75p",
    max: "job_node_size_max",
};

pub const JOB_CPU_SIZE: LadderKeys = LadderKeys {
    min: "job_cpu_size_min",
    p25: "job_cpu_size_25p",
    median: "job_cpu_size_median",
    mean: "job_cpu_size_mean",
    p75: "job_cpu_size_75p",
    max: "job_cpu_size_max",
};
