//! Routes free-text questions to the metric tool that answers them.
//!
//! The router keeps a small knowledge base of metric descriptions and a
//! TF-IDF index over it. The index is built on first use and rebuilt whenever
//! the knowledge base changes.

use crate::tools::MetricKind;
use crate::utils::normalize_description;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

const STOPWORDS: &[&str] = &[
    "QUAL", "QUAIS", "COMO", "ESTA", "PARA", "COM", "DAS", "DOS", "QUE", "UMA", "NAS", "NOS",
    "THE", "WHAT", "HOW", "AND", "FOR", "ARE",
];

fn tokenize(text: &str) -> Vec<String> {
    normalize_description(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3 && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub metric: MetricKind,
    pub text: String,
}

/// Metric descriptions the router matches questions against. Every mutation
/// bumps `version`, which invalidates any index built from older contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
    version: u64,
}

impl KnowledgeBase {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            version: 0,
        }
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn add(&mut self, metric: MetricKind, text: impl Into<String>) {
        self.entries.push(KnowledgeEntry {
            metric,
            text: text.into(),
        });
        self.version += 1;
    }

    /// Drops every entry for `metric`. Returns how many were removed.
    pub fn remove_metric(&mut self, metric: MetricKind) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.metric != metric);
        let removed = before - self.entries.len();
        if removed > 0 {
            self.version += 1;
        }
        removed
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        let mut kb = Self::empty();
        kb.add(
            MetricKind::GrossMargin,
            "margem bruta: lucro bruto sobre receita líquida; gross margin",
        );
        kb.add(
            MetricKind::NetMargin,
            "margem líquida: lucro líquido ou prejuízo sobre receita líquida; net margin, net profit margin",
        );
        kb.add(
            MetricKind::CurrentLiquidity,
            "liquidez corrente: ativo circulante sobre passivo circulante, capacidade de pagamento no curto prazo; current ratio, liquidity",
        );
        kb.add(
            MetricKind::Ebitda,
            "ebitda ou lajida: geração de caixa operacional antes de depreciação e amortização",
        );
        kb.add(
            MetricKind::Profitability,
            "análise de rentabilidade completa: margens bruta, operacional e líquida; profitability analysis",
        );
        kb.add(
            MetricKind::Roe,
            "roe: retorno sobre o patrimônio líquido, rentabilidade do acionista; return on equity",
        );
        kb.add(
            MetricKind::RevenueTrend,
            "tendência e projeção da receita, previsão de faturamento para o próximo período; revenue trend forecast",
        );
        kb.add(
            MetricKind::ExpenseAnomaly,
            "anomalia em despesa, gasto fora do padrão, aumento anormal de despesas; expense anomaly spike",
        );
        kb
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteMatch {
    pub metric: MetricKind,
    /// Cosine similarity in [0, 1]
    pub score: f64,
}

#[derive(Debug, Clone)]
struct TokenIndex {
    built_for_version: u64,
    /// token -> (entry index, tf-idf weight)
    postings: HashMap<String, Vec<(usize, f64)>>,
    idf: HashMap<String, f64>,
    norms: Vec<f64>,
    metrics: Vec<MetricKind>,
}

impl TokenIndex {
    fn build(kb: &KnowledgeBase) -> Self {
        let docs: Vec<Vec<String>> = kb.entries().iter().map(|e| tokenize(&e.text)).collect();
        let n = docs.len() as f64;

        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        for doc in &docs {
            let unique: HashSet<&String> = doc.iter().collect();
            for token in unique {
                *document_frequency.entry(token.clone()).or_insert(0) += 1;
            }
        }

        let idf: HashMap<String, f64> = document_frequency
            .into_iter()
            .map(|(token, df)| (token, ((n + 1.0) / (df as f64 + 1.0)).ln() + 1.0))
            .collect();

        let mut postings: HashMap<String, Vec<(usize, f64)>> = HashMap::new();
        let mut norms = Vec::with_capacity(docs.len());
        for (doc_idx, doc) in docs.iter().enumerate() {
            let mut tf: HashMap<&String, f64> = HashMap::new();
            for token in doc {
                *tf.entry(token).or_insert(0.0) += 1.0;
            }

            let mut norm = 0.0;
            for (token, count) in tf {
                let weight = count * idf[token];
                norm += weight * weight;
                postings.entry(token.clone()).or_default().push((doc_idx, weight));
            }
            norms.push(norm.sqrt());
        }

        debug!(
            "Built routing index: {} entries, {} tokens, version {}",
            docs.len(),
            postings.len(),
            kb.version()
        );

        Self {
            built_for_version: kb.version(),
            postings,
            idf,
            norms,
            metrics: kb.entries().iter().map(|e| e.metric).collect(),
        }
    }

    fn search(&self, question: &str) -> Option<RouteMatch> {
        let mut query_tf: HashMap<String, f64> = HashMap::new();
        for token in tokenize(question) {
            if self.idf.contains_key(&token) {
                *query_tf.entry(token).or_insert(0.0) += 1.0;
            }
        }
        if query_tf.is_empty() {
            return None;
        }

        let mut query_norm = 0.0;
        let mut dot: HashMap<usize, f64> = HashMap::new();
        for (token, count) in &query_tf {
            let q_weight = count * self.idf[token];
            query_norm += q_weight * q_weight;
            for (doc_idx, d_weight) in &self.postings[token] {
                *dot.entry(*doc_idx).or_insert(0.0) += q_weight * d_weight;
            }
        }
        let query_norm = query_norm.sqrt();

        // Best entry per metric; BTreeMap keeps tie-breaking deterministic
        let mut best: BTreeMap<MetricKind, f64> = BTreeMap::new();
        for (doc_idx, product) in dot {
            let score = product / (query_norm * self.norms[doc_idx]);
            let slot = best.entry(self.metrics[doc_idx]).or_insert(0.0);
            if score > *slot {
                *slot = score;
            }
        }

        best.into_iter()
            .fold(None, |acc: Option<RouteMatch>, (metric, score)| match acc {
                Some(current) if current.score >= score => Some(current),
                _ => Some(RouteMatch { metric, score }),
            })
    }
}

/// Lazily indexed question router.
#[derive(Debug, Clone)]
pub struct MetricRouter {
    knowledge: KnowledgeBase,
    index: Option<TokenIndex>,
}

impl Default for MetricRouter {
    fn default() -> Self {
        Self::new(KnowledgeBase::default())
    }
}

impl MetricRouter {
    pub fn new(knowledge: KnowledgeBase) -> Self {
        Self {
            knowledge,
            index: None,
        }
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Mutable access to the knowledge base. Changes made through it are picked
    /// up by the next `route` call.
    pub fn knowledge_mut(&mut self) -> &mut KnowledgeBase {
        &mut self.knowledge
    }

    /// True when an index exists and matches the current knowledge base.
    pub fn is_index_current(&self) -> bool {
        self.index
            .as_ref()
            .is_some_and(|idx| idx.built_for_version == self.knowledge.version())
    }

    fn index(&mut self) -> &TokenIndex {
        if !self.is_index_current() {
            self.index = None;
        }
        let knowledge = &self.knowledge;
        self.index.get_or_insert_with(|| TokenIndex::build(knowledge))
    }

    /// Best-matching metric for a question, or `None` if nothing overlaps.
    pub fn route(&mut self, question: &str) -> Option<RouteMatch> {
        let found = self.index().search(question);
        debug!("Routed {:?} to {:?}", question, found);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_portuguese_and_english_questions() {
        let mut router = MetricRouter::default();

        let cases = [
            ("Qual a margem bruta da empresa?", MetricKind::GrossMargin),
            ("Como está a liquidez corrente?", MetricKind::CurrentLiquidity),
            ("Existe alguma anomalia nas despesas com pessoal?", MetricKind::ExpenseAnomaly),
            ("What is the return on equity?", MetricKind::Roe),
            ("Calcule o EBITDA", MetricKind::Ebitda),
            ("Qual a previsão de faturamento?", MetricKind::RevenueTrend),
        ];

        for (question, expected) in cases {
            let found = router.route(question).unwrap();
            assert_eq!(found.metric, expected, "question: {}", question);
            assert!(found.score > 0.0 && found.score <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_unrelated_question_has_no_route() {
        let mut router = MetricRouter::default();
        assert!(router.route("bom dia").is_none());
        assert!(router.route("").is_none());
    }

    #[test]
    fn test_index_is_lazy_and_rebuilt_on_change() {
        let mut router = MetricRouter::default();
        assert!(!router.is_index_current());

        router.route("margem bruta");
        assert!(router.is_index_current());

        router.route("liquidez");
        assert!(router.is_index_current());

        assert!(router.route("xyzzy ajustado").is_none());
        router
            .knowledge_mut()
            .add(MetricKind::Ebitda, "ebitda ajustado xyzzy");
        assert!(!router.is_index_current());

        let found = router.route("xyzzy ajustado").unwrap();
        assert_eq!(found.metric, MetricKind::Ebitda);
        assert!(router.is_index_current());
    }

    #[test]
    fn test_remove_metric_invalidates() {
        let mut router = MetricRouter::default();
        router.route("roe");
        assert_eq!(router.knowledge_mut().remove_metric(MetricKind::Roe), 1);
        assert!(!router.is_index_current());
        assert_eq!(router.knowledge_mut().remove_metric(MetricKind::Roe), 0);

        let found = router.route("return on equity");
        assert!(found.map_or(true, |m| m.metric != MetricKind::Roe));
    }
}
