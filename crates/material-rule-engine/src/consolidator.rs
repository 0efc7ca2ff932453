//! 按 SKU 合并候选物料行

use crate::models::{CandidateLineItem, MaterialLineItem};
use std::collections::HashMap;
use tracing::debug;

/// 物料行合并器
///
/// 按首次出现顺序输出；同一 SKU 的数量累加，来源构件 ID 依次追加（不去重）。
/// 单位、描述、规则 ID 以首次出现为准。
#[derive(Debug, Default)]
pub struct Consolidator {
    items: Vec<MaterialLineItem>,
    index: HashMap<String, usize>,
}

impl Consolidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一个候选行
    pub fn push(&mut self, candidate: CandidateLineItem) {
        match self.index.get(&candidate.sku) {
            Some(&position) => {
                let item = &mut self.items[position];
                if item.uom != candidate.uom {
                    debug!(
                        sku = %item.sku,
                        kept = %item.uom,
                        ignored = %candidate.uom,
                        "同一 SKU 单位不一致，保留首次出现的单位"
                    );
                }
                item.qty += candidate.qty;
                item.source_feature_ids.push(candidate.source_feature_id);
            }
            None => {
                self.index.insert(candidate.sku.clone(), self.items.len());
                self.items.push(candidate.into());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn finish(self) -> Vec<MaterialLineItem> {
        self.items
    }

    /// 一次性合并全部候选行
    pub fn consolidate<I>(candidates: I) -> Vec<MaterialLineItem>
    where
        I: IntoIterator<Item = CandidateLineItem>,
    {
        let mut consolidator = Self::new();
        candidates.into_iter().for_each(|c| consolidator.push(c));
        consolidator.finish()
    }
}
