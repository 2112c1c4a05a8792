//! RandomForest classifier evaluated from a scikit-learn export.
//!
//! The export mirrors `estimator.tree_` of each fitted tree:
//! parallel arrays indexed by node id, with `children_left == -1` marking a leaf.
//!
//! Matching scikit-learn:
//! - rows are cast to `f32` before comparing (trees are fit on `f32` inputs)
//! - `x <= threshold` goes left
//! - per-tree probability = leaf class weights / their sum; forest = mean over trees
//! - `feature_importances_` = mean of per-tree normalized impurity decrease, renormalized

use crate::model::ProbabilityModel;
use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

const TREE_LEAF: i64 = -1;

/// One fitted tree as exported (`tree_` arrays).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeExport {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per node, per class weight (counts or fractions; only the ratio matters).
    pub value: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impurity: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_n_node_samples: Option<Vec<f64>>,
}

/// Whole-forest export (`model.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestExport {
    pub n_features: usize,
    /// `classes_`; the class labelled 1 is "at risk". Missing means `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<f64>>,
    /// `feature_importances_`; derived from the trees when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importances: Option<Vec<f64>>,
    pub trees: Vec<TreeExport>,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    left: u32,
    right: u32,
    feature: u32,
    threshold: f64,
    /// Normalized `[class 0, class 1]`; only read at leaves.
    proba: [f64; 2],
    leaf: bool,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    #[inline]
    fn leaf_proba(&self, row: &[f64]) -> [f64; 2] {
        let mut i = 0usize;
        loop {
            let n = &self.nodes[i];
            if n.leaf {
                return n.proba;
            }
            let x = row[n.feature as usize] as f32 as f64;
            i = if x <= n.threshold {
                n.left as usize
            } else {
                n.right as usize
            };
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    n_features: usize,
    positive_index: usize,
    trees: Vec<Tree>,
    importances: Vec<f64>,
}

impl RandomForest {
    pub fn from_reader<R: Read>(r: R) -> Result<Self> {
        let export: ForestExport =
            serde_json::from_reader(r).context("parse random forest export")?;
        Self::from_export(export)
    }

    /// Validate and compile an export. Any structural problem is an error.
    pub fn from_export(export: ForestExport) -> Result<Self> {
        ensure!(export.n_features > 0, "n_features must be > 0");
        ensure!(!export.trees.is_empty(), "forest has no trees");

        let positive_index = match &export.classes {
            None => 1,
            Some(classes) => {
                ensure!(
                    classes.len() == 2,
                    "binary classifier expected, export has {} classes",
                    classes.len()
                );
                classes
                    .iter()
                    .position(|c| *c == 1.0)
                    .ok_or_else(|| anyhow!("no class labelled 1 in classes={classes:?}"))?
            }
        };

        let mut trees = Vec::with_capacity(export.trees.len());
        for (ti, t) in export.trees.iter().enumerate() {
            let tree = compile_tree(t, export.n_features)
                .with_context(|| format!("invalid tree #{ti}"))?;
            trees.push(tree);
        }

        let importances = match &export.feature_importances {
            Some(v) => {
                ensure!(
                    v.len() == export.n_features,
                    "feature_importances has {} entries, n_features={}",
                    v.len(),
                    export.n_features
                );
                v.clone()
            }
            None => derive_importances(&export.trees, export.n_features)?,
        };
        for (i, w) in importances.iter().enumerate() {
            ensure!(
                w.is_finite() && *w >= 0.0,
                "feature importance #{i} must be finite and non-negative, got {w}"
            );
        }

        Ok(Self {
            n_features: export.n_features,
            positive_index,
            trees,
            importances,
        })
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Per-feature importance, aligned with the training column order.
    #[inline]
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}

impl ProbabilityModel for RandomForest {
    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2]> {
        ensure!(
            row.len() == self.n_features,
            "row has {} features, forest expects {}",
            row.len(),
            self.n_features
        );
        let mut acc = [0.0f64; 2];
        for t in &self.trees {
            let p = t.leaf_proba(row);
            acc[0] += p[0];
            acc[1] += p[1];
        }
        let n = self.trees.len() as f64;
        let pos = acc[self.positive_index] / n;
        let neg = acc[1 - self.positive_index] / n;
        Ok([neg, pos])
    }
}

fn compile_tree(t: &TreeExport, n_features: usize) -> Result<Tree> {
    let n = t.children_left.len();
    ensure!(n > 0, "tree has no nodes");
    ensure!(
        t.children_right.len() == n
            && t.feature.len() == n
            && t.threshold.len() == n
            && t.value.len() == n,
        "node arrays differ in length"
    );

    let mut nodes = Vec::with_capacity(n);
    for i in 0..n {
        let (l, r) = (t.children_left[i], t.children_right[i]);
        let value = &t.value[i];
        ensure!(value.len() == 2, "node {i}: expected 2 class weights, got {}", value.len());

        if l == TREE_LEAF {
            ensure!(r == TREE_LEAF, "node {i}: leaf with a right child");
            ensure!(
                value.iter().all(|v| v.is_finite() && *v >= 0.0),
                "node {i}: class weights must be finite and non-negative"
            );
            let total = value[0] + value[1];
            ensure!(total > 0.0, "node {i}: leaf has zero total weight");
            nodes.push(Node {
                left: 0,
                right: 0,
                feature: 0,
                threshold: 0.0,
                proba: [value[0] / total, value[1] / total],
                leaf: true,
            });
            continue;
        }

        // node ids are assigned depth-first, so children come after their parent;
        // requiring that also rules out cycles
        let in_range = |c: i64| c > i as i64 && (c as usize) < n;
        ensure!(
            in_range(l) && in_range(r),
            "node {i}: children ({l}, {r}) out of range"
        );
        let f = t.feature[i];
        ensure!(
            f >= 0 && (f as usize) < n_features,
            "node {i}: split feature {f} out of range (n_features={n_features})"
        );
        let threshold = t.threshold[i];
        ensure!(threshold.is_finite(), "node {i}: non-finite threshold");

        nodes.push(Node {
            left: l as u32,
            right: r as u32,
            feature: f as u32,
            threshold,
            proba: [0.0, 0.0],
            leaf: false,
        });
    }
    Ok(Tree { nodes })
}

/// Mean decrease in impurity, the way scikit-learn computes `feature_importances_`.
fn derive_importances(trees: &[TreeExport], n_features: usize) -> Result<Vec<f64>> {
    let mut sum = vec![0.0f64; n_features];
    let mut used = 0usize;

    for (ti, t) in trees.iter().enumerate() {
        let (Some(imp), Some(w)) = (&t.impurity, &t.weighted_n_node_samples) else {
            bail!(
                "tree #{ti}: feature_importances missing and tree lacks impurity / weighted_n_node_samples"
            );
        };
        let n = t.children_left.len();
        ensure!(
            imp.len() == n && w.len() == n,
            "tree #{ti}: impurity arrays differ in length"
        );
        // stumps carry no split information
        if n <= 1 {
            continue;
        }

        let mut tree_imp = vec![0.0f64; n_features];
        for i in 0..n {
            let l = t.children_left[i];
            if l == TREE_LEAF {
                continue;
            }
            let (l, r) = (l as usize, t.children_right[i] as usize);
            let f = t.feature[i] as usize;
            tree_imp[f] += w[i] * imp[i] - w[l] * imp[l] - w[r] * imp[r];
        }
        let total: f64 = tree_imp.iter().sum();
        if total > 0.0 {
            for v in &mut tree_imp {
                *v /= total;
            }
        }
        for (s, v) in sum.iter_mut().zip(&tree_imp) {
            *s += v;
        }
        used += 1;
    }

    if used == 0 {
        return Ok(sum);
    }
    for s in &mut sum {
        *s /= used as f64;
    }
    let total: f64 = sum.iter().sum();
    if total > 0.0 {
        for s in &mut sum {
            *s /= total;
        }
    }
    Ok(sum)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Two small trees over three features.
    ///
    /// tree 1: f0 <= 0.5 ? [4,1] : [1,4]
    /// tree 2: f1 <= 25 ? [3,1] : (f0 <= 0.5 ? [2,1] : [0,3])
    pub(crate) fn two_tree_export() -> ForestExport {
        ForestExport {
            n_features: 3,
            classes: Some(vec![0.0, 1.0]),
            feature_importances: None,
            trees: vec![
                TreeExport {
                    children_left: vec![1, -1, -1],
                    children_right: vec![2, -1, -1],
                    feature: vec![0, -2, -2],
                    threshold: vec![0.5, -2.0, -2.0],
                    value: vec![vec![5.0, 5.0], vec![4.0, 1.0], vec![1.0, 4.0]],
                    impurity: Some(vec![0.5, 0.0, 0.0]),
                    weighted_n_node_samples: Some(vec![10.0, 5.0, 5.0]),
                },
                TreeExport {
                    children_left: vec![1, -1, 3, -1, -1],
                    children_right: vec![2, -1, 4, -1, -1],
                    feature: vec![1, -2, 0, -2, -2],
                    threshold: vec![25.0, -2.0, 0.5, -2.0, -2.0],
                    value: vec![
                        vec![5.0, 5.0],
                        vec![3.0, 1.0],
                        vec![2.0, 4.0],
                        vec![2.0, 1.0],
                        vec![0.0, 3.0],
                    ],
                    impurity: Some(vec![0.5, 0.0, 0.5, 0.0, 0.0]),
                    weighted_n_node_samples: Some(vec![10.0, 4.0, 6.0, 3.0, 3.0]),
                },
            ],
        }
    }

    #[test]
    fn test_predict_proba_averages_leaves() {
        let rf = RandomForest::from_export(two_tree_export()).unwrap();
        assert_eq!(rf.n_trees(), 2);

        let p = rf.predict_proba(&[0.0, 0.0, 0.0]).unwrap();
        assert!((p[1] - 0.225).abs() < 1e-12);
        assert!((p[0] + p[1] - 1.0).abs() < 1e-12);

        let p = rf.predict_proba(&[1.0, 30.0, 0.0]).unwrap();
        assert!((p[1] - 0.9).abs() < 1e-12);

        let p = rf.predict_proba(&[0.0, 30.0, 0.0]).unwrap();
        assert!((p[1] - (0.2 + 1.0 / 3.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rows_compared_as_f32() {
        let mut ex = two_tree_export();
        ex.trees.truncate(1);
        ex.trees[0].threshold[0] = 0.1;
        let rf = RandomForest::from_export(ex).unwrap();
        // 0.1f32 widens to 0.10000000149..., which is above the f64 threshold 0.1
        let p = rf.predict_proba(&[0.1, 0.0, 0.0]).unwrap();
        assert!((p[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_positive_class_follows_labels() {
        let mut ex = two_tree_export();
        ex.classes = Some(vec![1.0, 0.0]);
        let rf = RandomForest::from_export(ex).unwrap();
        let p = rf.predict_proba(&[0.0, 0.0, 0.0]).unwrap();
        assert!((p[1] - 0.775).abs() < 1e-12);
    }

    #[test]
    fn test_derived_importances_match_mdi() {
        let rf = RandomForest::from_export(two_tree_export()).unwrap();
        let imp = rf.feature_importances();
        // tree 1: f0 = 1.0; tree 2: f1 = 2/5, f0 = 3/5
        assert!((imp[0] - 0.8).abs() < 1e-12);
        assert!((imp[1] - 0.2).abs() < 1e-12);
        assert_eq!(imp[2], 0.0);
    }

    #[test]
    fn test_exported_importances_win() {
        let mut ex = two_tree_export();
        ex.feature_importances = Some(vec![0.5, 0.25, 0.25]);
        let rf = RandomForest::from_export(ex).unwrap();
        assert_eq!(rf.feature_importances(), &[0.5, 0.25, 0.25]);
    }

    #[test]
    fn test_no_importance_source_is_error() {
        let mut ex = two_tree_export();
        ex.trees[1].impurity = None;
        let err = RandomForest::from_export(ex).unwrap_err();
        assert!(format!("{err:#}").contains("impurity"));
    }

    #[test]
    fn test_rejects_bad_structure() {
        let mut cyclic = two_tree_export();
        cyclic.trees[1].children_left[2] = 0;
        assert!(RandomForest::from_export(cyclic).is_err());

        let mut bad_feature = two_tree_export();
        bad_feature.trees[0].feature[0] = 7;
        assert!(RandomForest::from_export(bad_feature).is_err());

        let mut short = two_tree_export();
        short.trees[0].threshold.pop();
        assert!(RandomForest::from_export(short).is_err());

        let mut empty_leaf = two_tree_export();
        empty_leaf.trees[0].value[1] = vec![0.0, 0.0];
        assert!(RandomForest::from_export(empty_leaf).is_err());

        let mut three_classes = two_tree_export();
        three_classes.classes = Some(vec![0.0, 1.0, 2.0]);
        assert!(RandomForest::from_export(three_classes).is_err());

        let mut no_trees = two_tree_export();
        no_trees.trees.clear();
        assert!(RandomForest::from_export(no_trees).is_err());
    }

    #[test]
    fn test_rejects_negative_importance_and_wrong_row_len() {
        let mut ex = two_tree_export();
        ex.feature_importances = Some(vec![0.5, -0.1, 0.6]);
        assert!(RandomForest::from_export(ex).is_err());

        let rf = RandomForest::from_export(two_tree_export()).unwrap();
        assert!(rf.predict_proba(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_from_reader() {
        let json = serde_json::to_vec(&two_tree_export()).unwrap();
        let rf = RandomForest::from_reader(json.as_slice()).unwrap();
        assert_eq!(rf.n_features(), 3);
        assert!(RandomForest::from_reader(&b"{not json"[..]).is_err());
    }
}
