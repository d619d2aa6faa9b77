//! Structured Query Engine
//!
//! The orchestrator: owns the document source, the indexer, the catalogue
//! snapshot, and the response caches, and exposes the public
//! query/statistics/detail/rebuild API.
//!
//! # Execution Pipeline
//!
//! ```text
//! text → parse → snapshot → linear scan → filter → [aggregate] → order/limit
//! ```
//!
//! Execution is a full linear scan over every catalogued action record —
//! there is no secondary index beyond the flat catalogue. That is a
//! deliberate limitation: corpora are small enough to fit in memory, and the
//! scan keeps rebuilds trivially consistent.
//!
//! # Concurrency
//!
//! Every rebuild constructs a brand-new [`Catalogue`] and swaps an `Arc`
//! under a short write lock; in-flight queries keep their snapshot and never
//! observe a partially-rebuilt index.

use crate::cache::{CacheStats, LruQueryCache, DEFAULT_QUERY_CACHE_SIZE, DEFAULT_STATS_CACHE_SIZE};
use crate::document::{DocumentSource, ParamValue};
use crate::index::{ActionRecord, Catalogue, CataloguedAction, FineGrainedIndexer, IndexStats};
use crate::query::ast::QueryExpression;
use crate::query::error::{QueryError, QueryResult};
use crate::query::evaluator::{self, FieldLookup};
use crate::query::parser;
use crate::search::{Bm25Index, FusedHit, FusionMethod, HybridConfig, HybridSearchEngine};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of the query response cache
    pub query_cache_size: usize,
    /// Capacity of the statistics response cache
    pub stats_cache_size: usize,
    /// Lines of raw source shown on each side of a record in context output
    pub context_lines: usize,
    /// Fusion parameters for `search_text`
    pub hybrid: HybridConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_cache_size: DEFAULT_QUERY_CACHE_SIZE,
            stats_cache_size: DEFAULT_STATS_CACHE_SIZE,
            context_lines: 2,
            hybrid: HybridConfig::default(),
        }
    }
}

/// One matched action with its file/track context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionHit {
    /// Owning file path
    pub file_path: String,
    /// Owning skill name
    pub skill_name: String,
    /// Owning track name
    pub track_name: String,
    /// The catalogued record
    pub record: ActionRecord,
    /// Raw source lines around the record, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// One entry in a query result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResultItem {
    /// A matched action (plain queries)
    Action(ActionHit),
    /// An aggregated row (aggregate queries)
    Aggregate(BTreeMap<String, ParamValue>),
}

/// Response envelope for `query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Matched records or aggregated rows
    pub results: Vec<QueryResultItem>,
    /// Matches before offset/limit (groups, for aggregate queries)
    pub total_matches: usize,
    /// Entries actually returned
    pub returned_count: usize,
    /// Wall-clock execution time
    pub query_time_ms: f64,
    /// Whether this response was served from the cache
    pub cache_hit: bool,
    /// Parser degradation notice, when the text did not parse
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_warning: Option<String>,
}

/// Per-group statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    /// Records in this group
    pub count: usize,
    /// `min_<param>` / `avg_<param>` / `max_<param>` per numeric parameter
    #[serde(flatten)]
    pub metrics: BTreeMap<String, f64>,
}

/// Response envelope for `get_statistics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    /// Records scanned into the report
    pub total_actions: usize,
    /// Group value → statistics
    pub groups: BTreeMap<String, GroupStats>,
}

/// Full record detail with raw source context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDetail {
    /// Owning file path
    pub file_path: String,
    /// Owning skill name
    pub skill_name: String,
    /// Owning track name
    pub track_name: String,
    /// The catalogued record
    pub record: ActionRecord,
    /// Raw source lines around the record, when available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Cache counters for both response caches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineCacheStats {
    /// Query response cache
    pub query_cache: CacheStats,
    /// Statistics response cache
    pub stats_cache: CacheStats,
}

type QueryKey = (String, usize, bool);
type StatsKey = (String, String);

/// The public face of the retrieval backend
pub struct StructuredQueryEngine {
    source: Arc<dyn DocumentSource>,
    indexer: FineGrainedIndexer,
    catalogue: RwLock<Arc<Catalogue>>,
    query_cache: LruQueryCache<QueryKey, QueryResponse>,
    stats_cache: LruQueryCache<StatsKey, StatisticsReport>,
    hybrid: HybridSearchEngine,
    config: EngineConfig,
}

impl StructuredQueryEngine {
    /// Create an engine over a document source with default tuning
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self::with_config(source, EngineConfig::default())
    }

    /// Create an engine with explicit tuning
    pub fn with_config(source: Arc<dyn DocumentSource>, config: EngineConfig) -> Self {
        Self {
            source,
            indexer: FineGrainedIndexer::new(),
            catalogue: RwLock::new(Arc::new(Catalogue::default())),
            query_cache: LruQueryCache::new(config.query_cache_size),
            stats_cache: LruQueryCache::new(config.stats_cache_size),
            hybrid: HybridSearchEngine::with_config(config.hybrid.clone()),
            config,
        }
    }

    /// Current catalogue snapshot; cheap, and immutable once taken
    pub fn snapshot(&self) -> Arc<Catalogue> {
        Arc::clone(&self.catalogue.read())
    }

    /// Reload documents and rebuild the catalogue
    ///
    /// Both response caches are cleared first; unchanged files (by content
    /// hash) are carried forward unless `force` is set. The new catalogue is
    /// built aside and swapped in atomically.
    pub fn rebuild_index(&self, force: bool) -> QueryResult<IndexStats> {
        self.query_cache.clear();
        self.stats_cache.clear();

        let documents = self.source.load()?;
        let previous = self.snapshot();
        let (catalogue, stats) = self.indexer.index_all(&documents, Some(previous.as_ref()), force);

        *self.catalogue.write() = Arc::new(catalogue);
        info!(
            files = stats.total_files,
            indexed = stats.indexed_files,
            actions = stats.total_actions,
            force,
            "index rebuilt"
        );
        Ok(stats)
    }

    /// Run a query with caching enabled
    pub fn query(&self, text: &str, limit: usize, include_context: bool) -> QueryResponse {
        self.query_opts(text, limit, include_context, true)
    }

    /// Run a query, optionally bypassing the cache
    pub fn query_opts(
        &self,
        text: &str,
        limit: usize,
        include_context: bool,
        use_cache: bool,
    ) -> QueryResponse {
        let start = Instant::now();
        let key: QueryKey = (text.to_string(), limit, include_context);

        if use_cache {
            if let Some(mut cached) = self.query_cache.get(&key) {
                cached.cache_hit = true;
                cached.query_time_ms = elapsed_ms(start);
                debug!(query = text, "query served from cache");
                return cached;
            }
        }

        let expr = parser::parse(text);
        let snapshot = self.snapshot();
        let mut response = self.execute(&expr, &snapshot, limit, include_context);
        response.query_time_ms = elapsed_ms(start);

        if use_cache {
            self.query_cache.insert(key, response.clone());
        }
        response
    }

    fn execute(
        &self,
        expr: &QueryExpression,
        snapshot: &Catalogue,
        limit: usize,
        include_context: bool,
    ) -> QueryResponse {
        let matched = collect_matches(snapshot, expr);

        if expr.is_aggregate() {
            self.execute_aggregate(expr, &matched, limit)
        } else {
            self.execute_plain(expr, snapshot, matched, limit, include_context)
        }
    }

    fn execute_plain(
        &self,
        expr: &QueryExpression,
        snapshot: &Catalogue,
        mut matched: Vec<CataloguedAction<'_>>,
        limit: usize,
        include_context: bool,
    ) -> QueryResponse {
        let total_matches = matched.len();

        if !expr.order_by.is_empty() {
            matched.sort_by(|a, b| {
                for clause in &expr.order_by {
                    let left = a.field(&clause.field).unwrap_or(ParamValue::Null);
                    let right = b.field(&clause.field).unwrap_or(ParamValue::Null);
                    let ord = evaluator::compare_values(&left, &right);
                    let ord = if clause.descending { ord.reverse() } else { ord };
                    if ord != std::cmp::Ordering::Equal {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        let effective = expr.limit.unwrap_or(usize::MAX).min(limit);
        let results: Vec<QueryResultItem> = matched
            .into_iter()
            .skip(expr.offset)
            .take(effective)
            .map(|action| {
                let context = if include_context {
                    extract_context(snapshot, &action, self.config.context_lines)
                } else {
                    None
                };
                QueryResultItem::Action(ActionHit {
                    file_path: action.file_path.to_string(),
                    skill_name: action.skill_name.to_string(),
                    track_name: action.track_name.to_string(),
                    record: action.record.clone(),
                    context,
                })
            })
            .collect();

        QueryResponse {
            returned_count: results.len(),
            results,
            total_matches,
            query_time_ms: 0.0,
            cache_hit: false,
            parse_warning: expr.parse_warning.clone(),
        }
    }

    fn execute_aggregate(
        &self,
        expr: &QueryExpression,
        matched: &[CataloguedAction<'_>],
        limit: usize,
    ) -> QueryResponse {
        let mut rows =
            evaluator::aggregate(matched, &expr.aggregates, expr.group_by.as_ref());

        if let Some(having) = &expr.having {
            rows.retain(|row| evaluator::evaluate(having, row));
        }

        if !expr.order_by.is_empty() {
            rows.sort_by(|a, b| {
                for clause in &expr.order_by {
                    let left = a.field(&clause.field).unwrap_or(ParamValue::Null);
                    let right = b.field(&clause.field).unwrap_or(ParamValue::Null);
                    let ord = evaluator::compare_values(&left, &right);
                    let ord = if clause.descending { ord.reverse() } else { ord };
                    if ord != std::cmp::Ordering::Equal {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        let total_matches = rows.len();
        let effective = expr.limit.unwrap_or(usize::MAX).min(limit);
        let results: Vec<QueryResultItem> = rows
            .into_iter()
            .skip(expr.offset)
            .take(effective)
            .map(|row| QueryResultItem::Aggregate(row.to_map()))
            .collect();

        QueryResponse {
            returned_count: results.len(),
            results,
            total_matches,
            query_time_ms: 0.0,
            cache_hit: false,
            parse_warning: expr.parse_warning.clone(),
        }
    }

    /// Scan (optionally pre-filtered), group, and summarize numeric
    /// parameters per group
    ///
    /// An unknown `group_by` field is a reported error rather than a silent
    /// empty report.
    pub fn get_statistics(
        &self,
        query: Option<&str>,
        group_by: &str,
    ) -> QueryResult<StatisticsReport> {
        let key: StatsKey = (query.unwrap_or_default().to_string(), group_by.to_string());
        if let Some(cached) = self.stats_cache.get(&key) {
            return Ok(cached);
        }

        let snapshot = self.snapshot();
        let expr = query.map(parser::parse).unwrap_or_default();
        let matched = collect_matches(&snapshot, &expr);

        if !is_known_field(group_by) && !matched.iter().any(|a| a.field(group_by).is_some()) {
            return Err(QueryError::UnknownField(group_by.to_string()));
        }

        let mut groups: BTreeMap<String, Vec<&CataloguedAction<'_>>> = BTreeMap::new();
        for action in &matched {
            let group_value = action
                .field(group_by)
                .unwrap_or(ParamValue::Null)
                .as_str_lossy();
            groups.entry(group_value).or_default().push(action);
        }

        let groups: BTreeMap<String, GroupStats> = groups
            .into_iter()
            .map(|(group, members)| {
                let stats = GroupStats {
                    count: members.len(),
                    metrics: numeric_parameter_stats(&members),
                };
                (group, stats)
            })
            .collect();

        let report = StatisticsReport {
            total_actions: matched.len(),
            groups,
        };
        self.stats_cache.insert(key, report.clone());
        Ok(report)
    }

    /// Full record detail plus raw context; `None` for unknown file/path
    pub fn get_action_detail(&self, file: &str, json_path: &str) -> Option<ActionDetail> {
        let snapshot = self.snapshot();
        let doc = snapshot.get(file)?;

        for track in &doc.tracks {
            for record in &track.actions {
                if record.json_path == json_path {
                    let action = CataloguedAction {
                        file_path: file,
                        skill_name: &doc.skill_name,
                        track_name: &track.track_name,
                        record,
                    };
                    let context = extract_context(&snapshot, &action, self.config.context_lines);
                    return Some(ActionDetail {
                        file_path: file.to_string(),
                        skill_name: doc.skill_name.clone(),
                        track_name: track.track_name.clone(),
                        record: record.clone(),
                        context,
                    });
                }
            }
        }
        None
    }

    /// Counters for both response caches
    pub fn get_cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            query_cache: self.query_cache.stats(),
            stats_cache: self.stats_cache.stats(),
        }
    }

    /// Feed every catalogued action's search text into a BM25 index
    ///
    /// Doc ids are `<file>#<json_path>`, resolvable back through
    /// [`Self::get_action_detail`].
    pub fn index_search_text(&self, bm25: &mut Bm25Index) {
        let snapshot = self.snapshot();
        bm25.clear();
        for action in snapshot.iter_actions() {
            bm25.add_document(action.doc_id(), &search_text_of(&action));
        }
        debug!(documents = bm25.len(), "search text indexed");
    }

    /// Hybrid keyword + vector retrieval over the catalogue's doc ids
    ///
    /// `vector_ranked` comes from the external similarity provider, sorted
    /// descending.
    pub fn search_text(
        &self,
        bm25: &Bm25Index,
        query: &str,
        vector_ranked: &[(String, f32)],
        top_k: usize,
        method: FusionMethod,
    ) -> Vec<FusedHit> {
        self.hybrid.search(bm25, query, vector_ranked, top_k, method)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Linear scan: every record, filtered by type, track, and condition
fn collect_matches<'a>(
    snapshot: &'a Catalogue,
    expr: &QueryExpression,
) -> Vec<CataloguedAction<'a>> {
    // Accept both bare and fully-qualified type names in the filter
    let wanted_type = expr
        .action_type
        .as_deref()
        .map(crate::index::simplify_type_name);

    snapshot
        .iter_actions()
        .filter(|action| {
            if let Some(wanted) = &wanted_type {
                if !action.record.action_type.eq_ignore_ascii_case(wanted) {
                    return false;
                }
            }
            if let Some(wanted) = &expr.track_name {
                if !action.track_name.eq_ignore_ascii_case(wanted) {
                    return false;
                }
            }
            match &expr.condition {
                Some(condition) => evaluator::evaluate(condition, action),
                None => true,
            }
        })
        .collect()
}

/// Fields that always resolve, regardless of corpus content
fn is_known_field(name: &str) -> bool {
    matches!(
        name,
        "action_type"
            | "type"
            | "action_index"
            | "frame"
            | "duration"
            | "track_name"
            | "track"
            | "json_path"
            | "line_number"
            | "summary"
            | "file_path"
            | "file"
            | "skill_name"
            | "skill"
    )
}

/// min/avg/max per numeric parameter across a group
fn numeric_parameter_stats(members: &[&CataloguedAction<'_>]) -> BTreeMap<String, f64> {
    let mut samples: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for action in members {
        for (key, value) in &action.record.parameters {
            if let Some(v) = value.as_f64() {
                samples.entry(key.as_str()).or_default().push(v);
            }
        }
    }

    let mut metrics = BTreeMap::new();
    for (key, values) in samples {
        let count = values.len() as f64;
        let sum: f64 = values.iter().sum();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        metrics.insert(format!("min_{}", key), min);
        metrics.insert(format!("avg_{}", key), sum / count);
        metrics.insert(format!("max_{}", key), max);
    }
    metrics
}

/// Raw source lines around a record's anchored line
fn extract_context(
    snapshot: &Catalogue,
    action: &CataloguedAction<'_>,
    context_lines: usize,
) -> Option<String> {
    let doc = snapshot.get(action.file_path)?;
    let source = doc.source_text.as_deref()?;
    let line = action.record.line_number? as usize;

    let lines: Vec<&str> = source.lines().collect();
    if line == 0 || line > lines.len() {
        return None;
    }
    let start = line.saturating_sub(context_lines + 1);
    let end = (line + context_lines).min(lines.len());
    Some(lines[start..end].join("\n"))
}

/// The text a record contributes to the keyword index
fn search_text_of(action: &CataloguedAction<'_>) -> String {
    let record = action.record;
    let mut text = String::with_capacity(128);
    text.push_str(action.skill_name);
    text.push(' ');
    text.push_str(action.track_name);
    text.push(' ');
    text.push_str(&record.action_type);
    text.push(' ');
    text.push_str(&record.summary);
    for (key, value) in &record.parameters {
        text.push(' ');
        text.push_str(key);
        text.push(' ');
        text.push_str(&value.as_str_lossy());
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{SkillAction, SkillDocument, SkillTrack, StaticSource};

    fn corpus() -> Vec<SkillDocument> {
        vec![
            SkillDocument::new("skills/fireball.skill", "Fireball")
                .hash("hash-fireball")
                .track(
                    SkillTrack::new("DamageTrack", 0)
                        .action(
                            SkillAction::new("Game.Skills.DamageAction", 10)
                                .param("baseDamage", 250i64)
                                .param("damageType", "Fire"),
                        )
                        .action(
                            SkillAction::new("Game.Skills.DamageAction", 30)
                                .param("baseDamage", 150i64)
                                .param("damageType", "Fire"),
                        ),
                )
                .track(
                    SkillTrack::new("AnimTrack", 1).action(
                        SkillAction::new("AnimationAction", 0)
                            .duration(40)
                            .param("animationClipName", "Hero_Attack_01"),
                    ),
                ),
            SkillDocument::new("skills/frost.skill", "Frost Nova")
                .hash("hash-frost")
                .track(
                    SkillTrack::new("DamageTrack", 0)
                        .action(
                            SkillAction::new("DamageAction", 5)
                                .param("baseDamage", 50i64)
                                .param("damageType", "Ice"),
                        )
                        .action(
                            SkillAction::new("DamageAction", 8)
                                .param("baseDamage", 350i64)
                                .param("damageType", "Ice"),
                        ),
                ),
        ]
    }

    fn engine_with(docs: Vec<SkillDocument>) -> StructuredQueryEngine {
        let engine = StructuredQueryEngine::new(Arc::new(StaticSource::new(docs)));
        engine.rebuild_index(false).unwrap();
        engine
    }

    fn hit(item: &QueryResultItem) -> &ActionHit {
        match item {
            QueryResultItem::Action(hit) => hit,
            other => panic!("expected action hit, got {:?}", other),
        }
    }

    fn row(item: &QueryResultItem) -> &BTreeMap<String, ParamValue> {
        match item {
            QueryResultItem::Aggregate(row) => row,
            other => panic!("expected aggregate row, got {:?}", other),
        }
    }

    #[test]
    fn test_query_by_type_and_threshold() {
        let engine = engine_with(corpus());
        let response = engine.query("DamageAction where baseDamage > 200", 100, false);

        assert_eq!(response.total_matches, 2);
        assert_eq!(response.returned_count, 2);
        for item in &response.results {
            assert_eq!(hit(item).record.action_type, "DamageAction");
        }
        assert!(!response.cache_hit);
    }

    #[test]
    fn test_single_match_scenario() {
        let docs = vec![SkillDocument::new("a.skill", "A").track(
            SkillTrack::new("T", 0).action(
                SkillAction::new("DamageAction", 1).param("baseDamage", 250i64),
            ),
        )];
        let engine = engine_with(docs);

        let response = engine.query("DamageAction where baseDamage > 200", 100, true);
        assert_eq!(response.total_matches, 1);
        assert_eq!(hit(&response.results[0]).record.action_type, "DamageAction");
    }

    #[test]
    fn test_between_matches_only_inner_value() {
        let docs = vec![SkillDocument::new("a.skill", "A").track(
            SkillTrack::new("T", 0)
                .action(SkillAction::new("DamageAction", 1).param("baseDamage", 50i64))
                .action(SkillAction::new("DamageAction", 2).param("baseDamage", 150i64))
                .action(SkillAction::new("DamageAction", 3).param("baseDamage", 350i64)),
        )];
        let engine = engine_with(docs);

        let response = engine.query("baseDamage between 100 and 300", 100, false);
        assert_eq!(response.total_matches, 1);
        let record = &hit(&response.results[0]).record;
        assert_eq!(record.parameters["baseDamage"], ParamValue::Int(150));
    }

    #[test]
    fn test_contains_query() {
        let engine = engine_with(corpus());
        let response = engine.query("animationClipName contains Attack", 100, false);
        assert_eq!(response.total_matches, 1);
        assert_eq!(hit(&response.results[0]).record.action_type, "AnimationAction");
    }

    #[test]
    fn test_group_by_aggregation() {
        let docs = vec![SkillDocument::new("a.skill", "A").track(
            SkillTrack::new("T", 0)
                .action(
                    SkillAction::new("DamageAction", 1)
                        .param("baseDamage", 100i64)
                        .param("damageType", "Fire"),
                )
                .action(
                    SkillAction::new("DamageAction", 2)
                        .param("baseDamage", 200i64)
                        .param("damageType", "Fire"),
                )
                .action(
                    SkillAction::new("DamageAction", 3)
                        .param("baseDamage", 50i64)
                        .param("damageType", "Ice"),
                ),
        )];
        let engine = engine_with(docs);

        let response = engine.query(
            "SELECT COUNT(*), AVG(baseDamage) FROM DamageAction GROUP BY damageType",
            100,
            false,
        );

        assert_eq!(response.total_matches, 2);
        let fire = row(&response.results[0]);
        assert_eq!(fire["damageType"], ParamValue::Str("Fire".into()));
        assert_eq!(fire["count"], ParamValue::Int(2));
        assert_eq!(fire["avg_baseDamage"], ParamValue::Float(150.0));

        let ice = row(&response.results[1]);
        assert_eq!(ice["damageType"], ParamValue::Str("Ice".into()));
        assert_eq!(ice["count"], ParamValue::Int(1));
        assert_eq!(ice["avg_baseDamage"], ParamValue::Float(50.0));
    }

    #[test]
    fn test_having_and_order_by() {
        let engine = engine_with(corpus());
        let response = engine.query(
            "SELECT COUNT(*) FROM DamageAction GROUP BY damageType HAVING count > 1 \
             ORDER BY damageType DESC",
            100,
            false,
        );

        // Fire and Ice both have two records; descending group order
        assert_eq!(response.total_matches, 2);
        assert_eq!(row(&response.results[0])["damageType"], ParamValue::Str("Ice".into()));
        assert_eq!(row(&response.results[1])["damageType"], ParamValue::Str("Fire".into()));
    }

    #[test]
    fn test_order_by_and_limit_on_plain_results() {
        let engine = engine_with(corpus());
        let response = engine.query(
            "SELECT * FROM DamageAction WHERE baseDamage > 0 ORDER BY baseDamage DESC LIMIT 2",
            100,
            false,
        );

        assert_eq!(response.total_matches, 4);
        assert_eq!(response.returned_count, 2);
        assert_eq!(
            hit(&response.results[0]).record.parameters["baseDamage"],
            ParamValue::Int(350)
        );
        assert_eq!(
            hit(&response.results[1]).record.parameters["baseDamage"],
            ParamValue::Int(250)
        );
    }

    #[test]
    fn test_query_determinism() {
        let engine = engine_with(corpus());
        let first = engine.query_opts("DamageAction", 100, false, false);
        let second = engine.query_opts("DamageAction", 100, false, false);

        assert_eq!(first.total_matches, second.total_matches);
        assert_eq!(first.results, second.results);
    }

    #[test]
    fn test_cache_hit_on_repeat() {
        let engine = engine_with(corpus());

        let first = engine.query("DamageAction", 100, false);
        assert!(!first.cache_hit);

        let second = engine.query("DamageAction", 100, false);
        assert!(second.cache_hit);
        assert_eq!(first.results, second.results);

        let stats = engine.get_cache_stats();
        assert_eq!(stats.query_cache.hits, 1);
        assert_eq!(stats.query_cache.misses, 1);
    }

    #[test]
    fn test_cache_key_includes_limit() {
        let engine = engine_with(corpus());
        engine.query("DamageAction", 100, false);
        let other_limit = engine.query("DamageAction", 1, false);

        assert!(!other_limit.cache_hit);
        assert_eq!(other_limit.returned_count, 1);
    }

    #[test]
    fn test_rebuild_clears_caches_and_is_idempotent() {
        let engine = engine_with(corpus());
        engine.query("DamageAction", 100, false);
        engine.query("DamageAction", 100, false);
        assert_eq!(engine.get_cache_stats().query_cache.hits, 1);

        let stats = engine.rebuild_index(false).unwrap();
        // Same hashes: nothing reindexed, totals unchanged
        assert_eq!(stats.indexed_files, 0);
        assert_eq!(stats.skipped_files, 2);
        assert_eq!(stats.total_actions, 5);

        // Cache was cleared along with its counters
        let cache = engine.get_cache_stats();
        assert_eq!(cache.query_cache.size, 0);
        assert_eq!(cache.query_cache.hits, 0);

        let again = engine.rebuild_index(false).unwrap();
        assert_eq!(again.total_actions, stats.total_actions);
        assert_eq!(again.indexed_files, 0);
    }

    #[test]
    fn test_degraded_query_matches_all_with_warning() {
        let engine = engine_with(corpus());
        let response = engine.query(">>> nonsense <<<", 100, false);

        assert_eq!(response.total_matches, 5);
        assert!(response.parse_warning.is_some());
    }

    #[test]
    fn test_statistics_by_action_type() {
        let engine = engine_with(corpus());
        let report = engine.get_statistics(None, "action_type").unwrap();

        assert_eq!(report.total_actions, 5);
        let damage = &report.groups["DamageAction"];
        assert_eq!(damage.count, 4);
        assert_eq!(damage.metrics["min_baseDamage"], 50.0);
        assert_eq!(damage.metrics["max_baseDamage"], 350.0);
        assert_eq!(damage.metrics["avg_baseDamage"], 200.0);
        assert_eq!(report.groups["AnimationAction"].count, 1);
    }

    #[test]
    fn test_statistics_prefiltered_by_query() {
        let engine = engine_with(corpus());
        let report = engine
            .get_statistics(Some("DamageAction where damageType = 'Ice'"), "damageType")
            .unwrap();

        assert_eq!(report.total_actions, 2);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups["Ice"].count, 2);
    }

    #[test]
    fn test_statistics_unknown_group_by_is_error() {
        let engine = engine_with(corpus());
        let result = engine.get_statistics(None, "definitelyNotAField");
        assert!(matches!(result, Err(QueryError::UnknownField(_))));
    }

    #[test]
    fn test_statistics_cached() {
        let engine = engine_with(corpus());
        engine.get_statistics(None, "action_type").unwrap();
        engine.get_statistics(None, "action_type").unwrap();

        let stats = engine.get_cache_stats();
        assert_eq!(stats.stats_cache.hits, 1);
        assert_eq!(stats.stats_cache.misses, 1);
    }

    #[test]
    fn test_action_detail_found_and_not_found() {
        let engine = engine_with(corpus());

        let detail = engine
            .get_action_detail("skills/fireball.skill", "tracks[0].actions[1]")
            .unwrap();
        assert_eq!(detail.skill_name, "Fireball");
        assert_eq!(detail.track_name, "DamageTrack");
        assert_eq!(detail.record.parameters["baseDamage"], ParamValue::Int(150));

        assert!(engine
            .get_action_detail("skills/fireball.skill", "tracks[9].actions[9]")
            .is_none());
        assert!(engine.get_action_detail("nope.skill", "tracks[0].actions[0]").is_none());
    }

    #[test]
    fn test_context_extraction_from_source_text() {
        let source = "{\n  \"skill\": \"A\",\n  \"frame\": 42,\n  \"more\": true\n}\n";
        let docs = vec![SkillDocument::new("a.skill", "A")
            .source_text(source)
            .track(SkillTrack::new("T", 0).action(SkillAction::new("DamageAction", 42)))];
        let engine = engine_with(docs);

        let detail = engine.get_action_detail("a.skill", "tracks[0].actions[0]").unwrap();
        assert_eq!(detail.record.line_number, Some(3));
        let context = detail.context.unwrap();
        assert!(context.contains("\"frame\": 42"));
        assert!(context.contains("\"skill\": \"A\""));
    }

    #[test]
    fn test_hybrid_search_over_catalogue() {
        let engine = engine_with(corpus());
        let mut bm25 = Bm25Index::new();
        engine.index_search_text(&mut bm25);
        assert_eq!(bm25.len(), 5);

        let hits = engine.search_text(&bm25, "Attack", &[], 3, FusionMethod::ReciprocalRank);
        assert!(!hits.is_empty());
        // The animation record mentions the clip name in its search text
        assert!(hits[0].doc_id.contains("fireball"));

        let detail_path = hits[0].doc_id.split_once('#').unwrap();
        assert!(engine.get_action_detail(detail_path.0, detail_path.1).is_some());
    }

    #[test]
    fn test_qualified_type_name_in_from_clause() {
        let engine = engine_with(corpus());
        let response = engine.query(
            "SELECT COUNT(*) FROM Game.Skills.DamageAction",
            100,
            false,
        );
        assert_eq!(row(&response.results[0])["count"], ParamValue::Int(4));
    }

    #[test]
    fn test_track_name_filter() {
        let engine = engine_with(corpus());
        let expr = QueryExpression::match_all().with_track_name("AnimTrack");
        let snapshot = engine.snapshot();
        let matched = collect_matches(&snapshot, &expr);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].record.action_type, "AnimationAction");
    }
}
