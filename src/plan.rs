//! Simulated execution plan analysis.
//!
//! The plan tree is synthesized from the query's structure and the supplied
//! table statistics, not obtained from a database. Scans sit at the leaves,
//! join/filter/aggregate/sort/limit operators stack above them in the order a
//! real executor would apply them, and a result node roots the tree. The
//! rolled-up total comes from the cost model, so the plan total and the
//! orchestrator's cost analysis always agree.

use serde::{Deserialize, Serialize};

use crate::collector::QueryStatistics;
use crate::cost::{CostEstimate, CostModel};
use crate::model::TableStatistics;

// ---------------------------------------------------------------------------
// Plan tree
// ---------------------------------------------------------------------------

/// Operator kind of one plan node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanNodeType {
    TableScan,
    IndexScan,
    Join,
    Filter,
    Aggregate,
    Sort,
    Limit,
    Result,
}

/// One node of the simulated plan tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub node_type: PlanNodeType,
    /// Operator description, e.g. `Seq scan on orders`
    pub operation: String,
    /// Cost attributed to this node, in model units
    pub cost: f64,
    /// Rows this node is expected to emit
    pub estimated_rows: u64,
    /// Referenced table, for scan nodes
    pub table: Option<String>,
    /// Referenced index, for index scans
    pub index: Option<String>,
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    fn operator(node_type: PlanNodeType, operation: impl Into<String>) -> Self {
        Self {
            node_type,
            operation: operation.into(),
            cost: 0.0,
            estimated_rows: 0,
            table: None,
            index: None,
            children: Vec::new(),
        }
    }
}

/// Full analysis of one query: plan tree, rolled-up cost, detected
/// bottlenecks and their recommendations.
///
/// `bottlenecks[i]` and `recommendations[i]` describe the same finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlanAnalysis {
    pub root: PlanNode,
    pub total_cost: CostEstimate,
    pub bottlenecks: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ExecutionPlanAnalysis {
    /// Render the plan tree as an indented listing.
    pub fn render(&self) -> String {
        let mut out = String::new();
        render_node(&self.root, 0, &mut out);
        out
    }
}

fn render_node(node: &PlanNode, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(&format!(
        "{} (cost={:.2}, rows={})\n",
        node.operation, node.cost, node.estimated_rows
    ));
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}

// ---------------------------------------------------------------------------
// Bottleneck catalog
// ---------------------------------------------------------------------------

/// Detectable inefficiency patterns. Each maps to exactly one description
/// and one recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bottleneck {
    SelectStar,
    MissingLimit,
    UnindexedJoin,
    Subquery,
}

impl Bottleneck {
    fn description(self) -> &'static str {
        match self {
            Bottleneck::SelectStar => "SELECT * retorna colunas desnecessárias",
            Bottleneck::MissingLimit => "Consulta sem LIMIT pode retornar muitos registros",
            Bottleneck::UnindexedJoin => "JOINs sem índices apropriados",
            Bottleneck::Subquery => "Subconsultas podem ser otimizadas",
        }
    }

    fn recommendation(self) -> &'static str {
        match self {
            Bottleneck::SelectStar => "Especifique apenas as colunas necessárias no SELECT",
            Bottleneck::MissingLimit => "Adicione uma cláusula LIMIT para restringir o resultado",
            Bottleneck::UnindexedJoin => "Crie índices nas colunas utilizadas nas condições de JOIN",
            Bottleneck::Subquery => "Considere reescrever subconsultas como JOINs",
        }
    }
}

fn detect_bottlenecks(
    statistics: &QueryStatistics,
    normalized: &str,
    tables: &[TableStatistics],
) -> Vec<Bottleneck> {
    let mut found = Vec::new();

    if has_select_star(normalized) {
        found.push(Bottleneck::SelectStar);
    }
    if normalized.trim_start().starts_with("SELECT") && !statistics.has_limit {
        found.push(Bottleneck::MissingLimit);
    }
    if statistics.join_count > 0 && !tables.iter().any(|t| t.has_indexes()) {
        found.push(Bottleneck::UnindexedJoin);
    }
    if statistics.has_subquery() {
        found.push(Bottleneck::Subquery);
    }

    found
}

fn has_select_star(normalized: &str) -> bool {
    if let Some(pos) = normalized.find("SELECT") {
        let rest = normalized[pos + "SELECT".len()..].trim_start();
        return rest.starts_with('*');
    }
    false
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Builds [`ExecutionPlanAnalysis`] values from query text and statistics.
#[derive(Debug, Clone, Default)]
pub struct PlanAnalyzer {
    model: CostModel,
}

impl PlanAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: CostModel) -> Self {
        Self { model }
    }

    /// Analyze a query against the supplied table statistics.
    pub fn analyze(&self, query: &str, tables: &[TableStatistics]) -> ExecutionPlanAnalysis {
        let statistics = QueryStatistics::collect(query);
        let normalized = query.trim().to_uppercase();
        let total = self.model.estimate_collected(&statistics, tables);

        let root = self.build_tree(&statistics, tables, &total);
        let found = detect_bottlenecks(&statistics, &normalized, tables);

        ExecutionPlanAnalysis {
            root,
            total_cost: total,
            bottlenecks: found.iter().map(|b| b.description().to_string()).collect(),
            recommendations: found.iter().map(|b| b.recommendation().to_string()).collect(),
        }
    }

    /// Stack operators above the scan leaves in executor order. Node costs
    /// mirror the cost model's per-feature contributions; whatever the model
    /// charges beyond the stacked operators lands on the result node.
    fn build_tree(
        &self,
        statistics: &QueryStatistics,
        tables: &[TableStatistics],
        total: &CostEstimate,
    ) -> PlanNode {
        let weights = self.model.weights();
        let mut assigned = 0.0;

        let mut current: Vec<PlanNode> = tables.iter().map(|t| self.scan_node(t)).collect();
        let mut rows: u64 = tables.iter().map(|t| t.row_count).sum();
        assigned += current.iter().map(|n| n.cost).sum::<f64>();

        if statistics.join_count > 0 {
            let cost = 2.0 * weights.cpu_weight;
            let mut node = PlanNode::operator(PlanNodeType::Join, "Hash join");
            node.cost = cost;
            node.estimated_rows = rows;
            node.children = std::mem::take(&mut current);
            assigned += cost;
            current = vec![node];
        }

        if statistics.where_count > 0 {
            let mut node = PlanNode::operator(PlanNodeType::Filter, "Filter");
            node.estimated_rows = rows;
            node.children = std::mem::take(&mut current);
            current = vec![node];
        }

        if statistics.group_by_count > 0 {
            let points = if statistics.has_having { 2.0 } else { 1.0 };
            let cost = points * weights.cpu_weight;
            let operation = if statistics.has_having {
                "Group aggregate with HAVING"
            } else {
                "Group aggregate"
            };
            let mut node = PlanNode::operator(PlanNodeType::Aggregate, operation);
            node.cost = cost;
            node.estimated_rows = rows;
            node.children = std::mem::take(&mut current);
            assigned += cost;
            current = vec![node];
        }

        if statistics.order_by_count > 0 {
            let cost = weights.cpu_weight;
            let mut node = PlanNode::operator(PlanNodeType::Sort, "Sort");
            node.cost = cost;
            node.estimated_rows = rows;
            node.children = std::mem::take(&mut current);
            assigned += cost;
            current = vec![node];
        }

        if statistics.has_limit {
            if let Some(limit) = statistics.limit_value {
                rows = rows.min(limit);
            }
            let mut node = PlanNode::operator(PlanNodeType::Limit, "Limit");
            node.estimated_rows = rows;
            node.children = std::mem::take(&mut current);
            current = vec![node];
        }

        let mut root = PlanNode::operator(PlanNodeType::Result, "Result");
        root.cost = (total.total_cost - assigned).max(0.0);
        root.estimated_rows = rows;
        root.children = current;
        root
    }

    fn scan_node(&self, table: &TableStatistics) -> PlanNode {
        let (node_type, verb) = if table.has_indexes() {
            (PlanNodeType::IndexScan, "Index scan")
        } else {
            (PlanNodeType::TableScan, "Seq scan")
        };

        let mut node =
            PlanNode::operator(node_type, format!("{} on {}", verb, table.table_name));
        node.cost = table.row_count as f64 / self.model.weights().io_rows_per_unit;
        node.estimated_rows = table.row_count;
        node.table = Some(table.table_name.clone());
        node
    }
}
