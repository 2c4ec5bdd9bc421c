use crate::rootio::Tree;

/// Model inputs, in the column order the network was trained on.
pub const FEATURE_NAMES: [&str; 33] = [
    "trijetPtDR",
    "dijetPtDR",
    "bjetMass",
    "LdgJetMass",
    "SubldgJetMass",
    "trijetMass",
    "dijetMass",
    "bjetBdisc",
    "SoftDrop_n2",
    "LdgJetCvsL",
    "SubldgJetCvsL",
    "bjetCvsL",
    "LdgJetPtD",
    "SubldgJetPtD",
    "LdgJetAxis2",
    "SubldgJetAxis2",
    "bjetAxis2",
    "LdgJetMult",
    "SubldgJetMult",
    "LdgJetCvsB",
    "SubldgJetCvsB",
    "bjetCvsB",
    "DEtaDijetwithBJet",
    "dijetPtOverSumPt",
    "LdgJetPtTopCM",
    "SubldgJetPtTopCM",
    "bjetPtTopCM",
    "LdgJetDeltaPtOverSumPt",
    "SubldgJetDeltaPtOverSumPt",
    "bjetDeltaPtOverSumPt",
    "cosW_Jet1Jet2",
    "cosW_Jet1BJet",
    "cosW_Jet2BJet",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            names: names.iter().map(|n| n.as_ref().to_string()).collect(),
        }
    }

    pub fn resolved_top() -> Self {
        Self::new(&FEATURE_NAMES)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Schema columns the tree has no branch for, in schema order.
    pub fn missing_in(&self, tree: &Tree) -> Vec<String> {
        self.names
            .iter()
            .filter(|name| tree.find_branch(name).is_none())
            .cloned()
            .collect()
    }
}
