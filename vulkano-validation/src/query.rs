// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Gather information about rendering, held in query pools.
//!
//! Each query of a pool is in one of three states. A query must be reset before it can be begun
//! again once its results are available. The state changes made by commands take effect when the
//! command buffer is submitted, so they are simulated in submission order at that point.

use crate::{
    command_buffer::CommandBuffer, device::Device, handle::Id, object::UseCount,
    ValidationError, ValidationErrorKind,
};
use foldhash::HashMap;
use parking_lot::Mutex;

vulkan_enum! {
    /// The type of query that a query pool should perform.
    QueryType = QueryType(i32);

    /// Tracks the number of samples that pass per-fragment tests (e.g. the depth test).
    Occlusion = OCCLUSION,

    /// Tracks statistics on pipeline invocations and their input data.
    PipelineStatistics = PIPELINE_STATISTICS
    RequiresOneOf([
        RequiresAllOf([DeviceFeature(pipeline_statistics_query)]),
    ]),

    /// Writes timestamps at chosen points in a command buffer.
    Timestamp = TIMESTAMP,
}

vulkan_bitflags! {
    /// For pipeline statistics queries, the statistics that should be gathered.
    QueryPipelineStatisticFlags = QueryPipelineStatisticFlags(u32);

    INPUT_ASSEMBLY_VERTICES = INPUT_ASSEMBLY_VERTICES,
    INPUT_ASSEMBLY_PRIMITIVES = INPUT_ASSEMBLY_PRIMITIVES,
    VERTEX_SHADER_INVOCATIONS = VERTEX_SHADER_INVOCATIONS,
    CLIPPING_INVOCATIONS = CLIPPING_INVOCATIONS,
    FRAGMENT_SHADER_INVOCATIONS = FRAGMENT_SHADER_INVOCATIONS,
    COMPUTE_SHADER_INVOCATIONS = COMPUTE_SHADER_INVOCATIONS,
}

vulkan_bitflags! {
    /// How the results of queries are retrieved.
    QueryResultFlags = QueryResultFlags(u32);

    /// Results are written as 64-bit values instead of 32-bit.
    RESULT_64 = TYPE_64,

    /// Wait until the results of all queries are available.
    WAIT = WAIT,

    /// Write an availability value alongside each result.
    WITH_AVAILABILITY = WITH_AVAILABILITY,

    /// Allow writing partial results for queries that are not yet available.
    PARTIAL = PARTIAL,
}

/// Parameters to create a new `QueryPool`.
#[derive(Clone, Debug)]
pub struct QueryPoolCreateInfo {
    /// The type of query that the pool should be for.
    ///
    /// The default value is `QueryType::Occlusion`.
    pub query_type: QueryType,

    /// The number of queries to create in the pool.
    ///
    /// The default value is `0`, which must be overridden.
    pub query_count: u32,

    /// If `query_type` is `QueryType::PipelineStatistics`, the statistics to query.
    ///
    /// The default value is empty.
    pub pipeline_statistics: QueryPipelineStatisticFlags,

    pub _ne: crate::NonExhaustive,
}

impl Default for QueryPoolCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            query_type: QueryType::Occlusion,
            query_count: 0,
            pipeline_statistics: QueryPipelineStatisticFlags::empty(),
            _ne: crate::NonExhaustive(()),
        }
    }
}

impl QueryPoolCreateInfo {
    /// Returns a `QueryPoolCreateInfo` with the specified `query_type`.
    #[inline]
    pub fn query_type(query_type: QueryType) -> Self {
        Self {
            query_type,
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            query_type,
            query_count,
            pipeline_statistics,
            _ne: _,
        } = self;

        query_type.validate_device(device).map_err(|err| {
            err.add_context("query_type")
                .set_vuids(&["VUID-VkQueryPoolCreateInfo-queryType-00791"])
        })?;

        if query_count == 0 {
            return Err(Box::new(ValidationError {
                context: "query_count".into(),
                problem: "is zero".into(),
                vuids: &["VUID-VkQueryPoolCreateInfo-queryCount-02763"],
                kind: ValidationErrorKind::Parameter,
                ..Default::default()
            }));
        }

        if query_type == QueryType::PipelineStatistics && pipeline_statistics.is_empty() {
            return Err(Box::new(ValidationError {
                problem: "`query_type` is `QueryType::PipelineStatistics`, but \
                    `pipeline_statistics` is empty"
                    .into(),
                vuids: &["VUID-VkQueryPoolCreateInfo-queryType-09534"],
                ..Default::default()
            }));
        }

        Ok(())
    }
}

/// The state of a single query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QueryState {
    /// The query has been reset, or has never been used. Its results are not available.
    #[default]
    Unavailable,

    /// The query has begun, but not ended.
    Active,

    /// The query has ended, and its results are available.
    Available,
}

#[derive(Clone, Copy, Debug, Default)]
struct QuerySlot {
    state: QueryState,
    last_command_buffer: Option<Id<CommandBuffer>>,
}

/// A pool of queries of one type.
#[derive(Debug)]
pub struct QueryPool {
    query_type: QueryType,
    query_count: u32,
    pipeline_statistics: QueryPipelineStatisticFlags,
    queries: Mutex<Vec<QuerySlot>>,
    use_count: UseCount,
}

impl_object!(QueryPool, QueryPool, query_pools);

impl QueryPool {
    #[inline]
    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    #[inline]
    pub fn query_count(&self) -> u32 {
        self.query_count
    }

    #[inline]
    pub fn pipeline_statistics(&self) -> QueryPipelineStatisticFlags {
        self.pipeline_statistics
    }

    /// Returns the state of a query, or `None` if the index is out of range.
    #[inline]
    pub fn query_state(&self, query: u32) -> Option<QueryState> {
        self.queries
            .lock()
            .get(query as usize)
            .map(|slot| slot.state)
    }

    /// Returns the command buffer that last reset or began a query.
    #[inline]
    pub fn last_command_buffer(&self, query: u32) -> Option<Id<CommandBuffer>> {
        self.queries
            .lock()
            .get(query as usize)
            .and_then(|slot| slot.last_command_buffer)
    }
}

/// A query state change made by a recorded command, which takes effect at submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum QueryOp {
    Reset {
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
    },
    Begin {
        query_pool: Id<QueryPool>,
        query: u32,
    },
    End {
        query_pool: Id<QueryPool>,
        query: u32,
    },
    Timestamp {
        query_pool: Id<QueryPool>,
        query: u32,
    },
}

/// The query states as they would be after the command buffers of a submission so far have
/// executed.
#[derive(Debug, Default)]
pub(crate) struct QueryOverlay {
    states: HashMap<(Id<QueryPool>, u32), (QueryState, Id<CommandBuffer>)>,
}

impl Device {
    /// Creates a new query pool. All of its queries are unavailable.
    pub fn create_query_pool(
        &self,
        create_info: QueryPoolCreateInfo,
    ) -> Result<Id<QueryPool>, Box<ValidationError>> {
        self.reported(self.validate_create_query_pool(&create_info))?;

        Ok(self.record_create_query_pool(create_info))
    }

    pub fn validate_create_query_pool(
        &self,
        create_info: &QueryPoolCreateInfo,
    ) -> Result<(), Box<ValidationError>> {
        create_info
            .validate(self)
            .map_err(|err| err.add_context("create_info"))
    }

    pub fn record_create_query_pool(&self, create_info: QueryPoolCreateInfo) -> Id<QueryPool> {
        let QueryPoolCreateInfo {
            query_type,
            query_count,
            pipeline_statistics,
            _ne: _,
        } = create_info;

        self.objects.query_pools.register(QueryPool {
            query_type,
            query_count,
            pipeline_statistics,
            queries: Mutex::new(vec![QuerySlot::default(); query_count as usize]),
            use_count: UseCount::default(),
        })
    }

    /// Destroys a query pool.
    pub fn destroy_query_pool(
        &self,
        query_pool: Id<QueryPool>,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_destroy_query_pool(query_pool))?;
        self.record_destroy_query_pool(query_pool);

        Ok(())
    }

    pub fn validate_destroy_query_pool(
        &self,
        query_pool: Id<QueryPool>,
    ) -> Result<(), Box<ValidationError>> {
        let query_pool_record = self.lookup(
            query_pool,
            "query_pool",
            &["VUID-vkDestroyQueryPool-queryPool-parameter"],
        )?;

        if query_pool_record.use_count.is_in_use() {
            return Err(Box::new(ValidationError {
                context: "query_pool".into(),
                problem: format!(
                    "cannot delete {} that is currently in use by a command buffer",
                    query_pool.erase(),
                )
                .into(),
                vuids: &["VUID-vkDestroyQueryPool-queryPool-00793"],
                kind: ValidationErrorKind::Lifetime,
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_destroy_query_pool(&self, query_pool: Id<QueryPool>) {
        let _ = self.objects.query_pools.erase(query_pool);
    }

    /// Resets a range of queries from the host.
    pub fn reset_query_pool(
        &self,
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_reset_query_pool(query_pool, first_query, query_count))?;
        self.record_reset_query_pool(query_pool, first_query, query_count);

        Ok(())
    }

    pub fn validate_reset_query_pool(
        &self,
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
    ) -> Result<(), Box<ValidationError>> {
        let query_pool_record = self.lookup(
            query_pool,
            "query_pool",
            &["VUID-vkResetQueryPool-queryPool-parameter"],
        )?;

        if !self.enabled_features().host_query_reset {
            return Err(Box::new(ValidationError {
                requires_one_of: crate::RequiresOneOf(&[crate::RequiresAllOf(&[
                    crate::Requires::DeviceFeature("host_query_reset"),
                ])]),
                vuids: &["VUID-vkResetQueryPool-None-02665"],
                ..Default::default()
            }));
        }

        if first_query >= query_pool_record.query_count {
            return Err(Box::new(ValidationError {
                context: "first_query".into(),
                problem: "is not less than the number of queries in `query_pool`".into(),
                vuids: &["VUID-vkResetQueryPool-firstQuery-02666"],
                ..Default::default()
            }));
        }

        if first_query as u64 + query_count as u64 > query_pool_record.query_count as u64 {
            return Err(Box::new(ValidationError {
                problem: "`first_query` + `query_count` is greater than the number of queries \
                    in `query_pool`"
                    .into(),
                vuids: &["VUID-vkResetQueryPool-firstQuery-02667"],
                ..Default::default()
            }));
        }

        Ok(())
    }

    pub fn record_reset_query_pool(
        &self,
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
    ) {
        if let Ok(query_pool_record) = self.objects.query_pools.get(query_pool) {
            let mut queries = query_pool_record.queries.lock();
            let end = (first_query as usize + query_count as usize).min(queries.len());

            for slot in queries.get_mut(first_query as usize..end).into_iter().flatten() {
                slot.state = QueryState::Unavailable;
            }
        }
    }

    /// Checks a read of query results.
    ///
    /// Reading results that are not available is allowed, but without `WAIT`, `PARTIAL` or
    /// `WITH_AVAILABILITY` the call will not write them. This is reported as a warning.
    pub fn get_query_pool_results(
        &self,
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
        flags: QueryResultFlags,
    ) -> Result<(), Box<ValidationError>> {
        self.reported(self.validate_get_query_pool_results(
            query_pool,
            first_query,
            query_count,
            flags,
        ))
    }

    pub fn validate_get_query_pool_results(
        &self,
        query_pool: Id<QueryPool>,
        first_query: u32,
        query_count: u32,
        flags: QueryResultFlags,
    ) -> Result<(), Box<ValidationError>> {
        let query_pool_record = self.lookup(
            query_pool,
            "query_pool",
            &["VUID-vkGetQueryPoolResults-queryPool-parameter"],
        )?;

        if first_query >= query_pool_record.query_count {
            return Err(Box::new(ValidationError {
                context: "first_query".into(),
                problem: "is not less than the number of queries in `query_pool`".into(),
                vuids: &["VUID-vkGetQueryPoolResults-firstQuery-00813"],
                ..Default::default()
            }));
        }

        if first_query as u64 + query_count as u64 > query_pool_record.query_count as u64 {
            return Err(Box::new(ValidationError {
                problem: "`first_query` + `query_count` is greater than the number of queries \
                    in `query_pool`"
                    .into(),
                vuids: &["VUID-vkGetQueryPoolResults-firstQuery-00816"],
                ..Default::default()
            }));
        }

        if !flags.intersects(
            QueryResultFlags::WAIT
                | QueryResultFlags::PARTIAL
                | QueryResultFlags::WITH_AVAILABILITY,
        ) {
            let queries = query_pool_record.queries.lock();
            let unavailable = (first_query..first_query + query_count)
                .find(|&query| queries[query as usize].state != QueryState::Available);

            if let Some(query) = unavailable {
                self.report_warning(
                    "UNASSIGNED-CoreValidation-QueryPool-ResultsUnavailable",
                    format!(
                        "the results of query {} of {} are read while they are unavailable, \
                        and `flags` contains none of `WAIT`, `PARTIAL` or `WITH_AVAILABILITY`",
                        query,
                        query_pool.erase(),
                    ),
                    &[query_pool.erase()],
                );
            }
        }

        Ok(())
    }

    /// Applies the query operations of a command buffer to `overlay`, in recording order, and
    /// checks that each one is allowed in the state that the previous ones leave behind.
    pub(crate) fn simulate_query_ops(
        &self,
        command_buffer: Id<CommandBuffer>,
        ops: &[QueryOp],
        overlay: &mut QueryOverlay,
    ) -> Result<(), Box<ValidationError>> {
        for &op in ops {
            match op {
                QueryOp::Reset {
                    query_pool,
                    first_query,
                    query_count,
                } => {
                    for query in first_query..first_query.saturating_add(query_count) {
                        overlay
                            .states
                            .insert((query_pool, query), (QueryState::Unavailable, command_buffer));
                    }
                }
                QueryOp::Begin { query_pool, query } => {
                    if self.overlay_state(overlay, query_pool, query) == QueryState::Available {
                        return Err(Box::new(ValidationError {
                            problem: format!(
                                "query {} of {} is begun by {}, but its results are still \
                                available; it must be reset first",
                                query,
                                query_pool.erase(),
                                command_buffer.erase(),
                            )
                            .into(),
                            vuids: &["VUID-vkCmdBeginQuery-None-00807"],
                            ..Default::default()
                        }));
                    }

                    overlay
                        .states
                        .insert((query_pool, query), (QueryState::Active, command_buffer));
                }
                QueryOp::End { query_pool, query } => {
                    overlay
                        .states
                        .insert((query_pool, query), (QueryState::Available, command_buffer));
                }
                QueryOp::Timestamp { query_pool, query } => {
                    if self.overlay_state(overlay, query_pool, query) == QueryState::Available {
                        return Err(Box::new(ValidationError {
                            problem: format!(
                                "a timestamp is written to query {} of {} by {}, but its \
                                results are still available; it must be reset first",
                                query,
                                query_pool.erase(),
                                command_buffer.erase(),
                            )
                            .into(),
                            vuids: &["VUID-vkCmdWriteTimestamp-None-00830"],
                            ..Default::default()
                        }));
                    }

                    overlay
                        .states
                        .insert((query_pool, query), (QueryState::Available, command_buffer));
                }
            }
        }

        Ok(())
    }

    fn overlay_state(
        &self,
        overlay: &QueryOverlay,
        query_pool: Id<QueryPool>,
        query: u32,
    ) -> QueryState {
        overlay
            .states
            .get(&(query_pool, query))
            .map(|&(state, _)| state)
            .or_else(|| {
                self.objects
                    .query_pools
                    .get(query_pool)
                    .ok()
                    .and_then(|record| record.query_state(query))
            })
            .unwrap_or_default()
    }

    /// Writes the simulated query states to the query pools.
    pub(crate) fn commit_query_overlay(&self, overlay: QueryOverlay) {
        for ((query_pool, query), (state, command_buffer)) in overlay.states {
            if let Ok(query_pool_record) = self.objects.query_pools.get(query_pool) {
                if let Some(slot) = query_pool_record.queries.lock().get_mut(query as usize) {
                    slot.state = state;

                    if state != QueryState::Available {
                        slot.last_command_buffer = Some(command_buffer);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        QueryOp, QueryOverlay, QueryPipelineStatisticFlags, QueryPoolCreateInfo, QueryResultFlags,
        QueryState, QueryType,
    };
    use crate::{
        device::{DeviceExtensions, DeviceFeatures},
        handle::Id,
    };

    #[test]
    fn create() {
        let (device, _queue, _log) = test_device!();

        assert_should_fail!(
            device.create_query_pool(QueryPoolCreateInfo::query_type(QueryType::Occlusion)),
            "VUID-VkQueryPoolCreateInfo-queryCount-02763",
        );
        assert_should_fail!(
            device.create_query_pool(QueryPoolCreateInfo {
                query_count: 4,
                ..QueryPoolCreateInfo::query_type(QueryType::PipelineStatistics)
            }),
            "VUID-VkQueryPoolCreateInfo-queryType-09534",
        );

        let query_pool = device
            .create_query_pool(QueryPoolCreateInfo {
                query_count: 4,
                pipeline_statistics: QueryPipelineStatisticFlags::VERTEX_SHADER_INVOCATIONS,
                ..QueryPoolCreateInfo::query_type(QueryType::PipelineStatistics)
            })
            .unwrap();
        assert_eq!(
            device.get(query_pool).unwrap().query_state(3),
            Some(QueryState::Unavailable)
        );

        let (device, _queue, _log) =
            test_device!(DeviceFeatures::empty(), DeviceExtensions::empty());
        assert_should_fail!(
            device.create_query_pool(QueryPoolCreateInfo {
                query_count: 4,
                pipeline_statistics: QueryPipelineStatisticFlags::VERTEX_SHADER_INVOCATIONS,
                ..QueryPoolCreateInfo::query_type(QueryType::PipelineStatistics)
            }),
            "VUID-VkQueryPoolCreateInfo-queryType-00791",
        );
    }

    #[test]
    fn host_reset() {
        let (device, _queue, _log) = test_device!();
        let query_pool = device
            .create_query_pool(QueryPoolCreateInfo {
                query_count: 4,
                ..QueryPoolCreateInfo::query_type(QueryType::Timestamp)
            })
            .unwrap();

        assert_should_fail!(
            device.reset_query_pool(query_pool, 4, 1),
            "VUID-vkResetQueryPool-firstQuery-02666",
        );
        assert_should_fail!(
            device.reset_query_pool(query_pool, 2, 3),
            "VUID-vkResetQueryPool-firstQuery-02667",
        );
        device.reset_query_pool(query_pool, 0, 4).unwrap();

        let (device, _queue, _log) =
            test_device!(DeviceFeatures::empty(), DeviceExtensions::empty());
        let query_pool = device
            .create_query_pool(QueryPoolCreateInfo {
                query_count: 4,
                ..QueryPoolCreateInfo::query_type(QueryType::Timestamp)
            })
            .unwrap();
        assert_should_fail!(
            device.reset_query_pool(query_pool, 0, 4),
            "VUID-vkResetQueryPool-None-02665",
        );
    }

    #[test]
    fn overlay_requires_reset() {
        let (device, _queue, log) = test_device!();
        let query_pool = device
            .create_query_pool(QueryPoolCreateInfo {
                query_count: 2,
                ..Default::default()
            })
            .unwrap();
        let command_buffer = Id::from_raw(1);

        let mut overlay = QueryOverlay::default();
        device
            .simulate_query_ops(
                command_buffer,
                &[
                    QueryOp::Begin {
                        query_pool,
                        query: 0,
                    },
                    QueryOp::End {
                        query_pool,
                        query: 0,
                    },
                ],
                &mut overlay,
            )
            .unwrap();
        device.commit_query_overlay(overlay);
        assert_eq!(
            device.get(query_pool).unwrap().query_state(0),
            Some(QueryState::Available)
        );

        device
            .get_query_pool_results(query_pool, 0, 2, QueryResultFlags::empty())
            .unwrap();
        assert!(log.contains("UNASSIGNED-CoreValidation-QueryPool-ResultsUnavailable"));

        let mut overlay = QueryOverlay::default();
        assert_should_fail!(
            device.simulate_query_ops(
                command_buffer,
                &[QueryOp::Begin {
                    query_pool,
                    query: 0,
                }],
                &mut overlay,
            ),
            "VUID-vkCmdBeginQuery-None-00807",
        );

        let mut overlay = QueryOverlay::default();
        device
            .simulate_query_ops(
                command_buffer,
                &[
                    QueryOp::Reset {
                        query_pool,
                        first_query: 0,
                        query_count: 1,
                    },
                    QueryOp::Begin {
                        query_pool,
                        query: 0,
                    },
                ],
                &mut overlay,
            )
            .unwrap();
    }
}
