// ==============================================================================
// curated.rs - Hand-Curated Pharmacogenomic Data
// ==============================================================================
// Description: Fallback allele functions, rsID mappings and the CPIC-aligned
//              drug-gene interaction table
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Allele functions here are used only for genes without any CPIC table.
// rsID mappings fill identifiers the CPIC tables do not cover.
// ==============================================================================

use crate::alleles::FunctionalClass::{self, Decreased, Increased, NoFunction, Normal};
use crate::interactions::{DrugGeneInteraction, RiskLabel};
use crate::phenotype::Phenotype;

/// Gene → (star allele, functional class)
pub const ALLELE_FUNCTIONS: &[(&str, &[(&str, FunctionalClass)])] = &[
    (
        "CYP2D6",
        &[
            ("*1", Normal),
            ("*2", Normal),
            ("*3", NoFunction),
            ("*4", NoFunction),
            ("*5", NoFunction),
            ("*6", NoFunction),
            ("*9", Decreased),
            ("*10", Decreased),
            ("*17", Decreased),
            ("*41", Decreased),
        ],
    ),
    (
        "CYP2C19",
        &[
            ("*1", Normal),
            ("*2", NoFunction),
            ("*3", NoFunction),
            ("*4", NoFunction),
            ("*17", Increased),
        ],
    ),
    (
        "CYP2C9",
        &[
            ("*1", Normal),
            ("*2", Decreased),
            // CPIC classifies *3 as decreased
            ("*3", Decreased),
            ("*5", Decreased),
            ("*6", NoFunction),
            ("*8", Decreased),
            ("*11", Decreased),
        ],
    ),
    (
        "SLCO1B1",
        &[
            ("*1", Normal),
            ("*5", Decreased),
            ("*15", Decreased),
            ("*17", Decreased),
        ],
    ),
    (
        "TPMT",
        &[
            ("*1", Normal),
            ("*2", NoFunction),
            ("*3A", NoFunction),
            ("*3B", NoFunction),
            ("*3C", NoFunction),
        ],
    ),
    (
        "DPYD",
        &[
            ("*1", Normal),
            ("*2A", NoFunction),
            ("*13", NoFunction),
            ("c.2846A>T", Decreased),
            ("c.1236G>A/HapB3", Decreased),
        ],
    ),
];

/// rsID → (gene, star allele) for VCFs without GENE/STAR annotations
pub const RSID_ALLELES: &[(&str, &str, &str)] = &[
    ("rs35742686", "CYP2D6", "*3"),
    ("rs3892097", "CYP2D6", "*4"),
    ("rs5030655", "CYP2D6", "*6"),
    ("rs1065852", "CYP2D6", "*10"),
    ("rs28371725", "CYP2D6", "*41"),
    ("rs16947", "CYP2D6", "*2"),
    ("rs4244285", "CYP2C19", "*2"),
    ("rs4986893", "CYP2C19", "*3"),
    ("rs28399504", "CYP2C19", "*4"),
    ("rs12248560", "CYP2C19", "*17"),
    ("rs1799853", "CYP2C9", "*2"),
    ("rs1057910", "CYP2C9", "*3"),
    ("rs4149056", "SLCO1B1", "*5"),
    ("rs1800462", "TPMT", "*2"),
    ("rs1800460", "TPMT", "*3B"),
    ("rs1142345", "TPMT", "*3C"),
    ("rs3918290", "DPYD", "*2A"),
    ("rs55886062", "DPYD", "*13"),
    ("rs67376798", "DPYD", "c.2846A>T"),
];

const URM: &str = "Ultra-rapid Metabolizer";
const NM: &str = "Normal Metabolizer";
const IM: &str = "Intermediate Metabolizer";
const PM: &str = "Poor Metabolizer";

const SAFE: &str = "Safe";
const ADJUST: &str = "Adjust Dosage";
const TOXIC: &str = "Toxic";
const INEFFECTIVE: &str = "Ineffective";

const CODEINE_URL: &str = "https://cpicpgx.org/guidelines/guideline-for-codeine-and-cyp2d6/";
const WARFARIN_URL: &str = "https://cpicpgx.org/guidelines/guideline-for-warfarin-and-cyp2c9-and-vkorc1/";
const SIMVASTATIN_URL: &str = "https://cpicpgx.org/guidelines/guideline-for-simvastatin-and-slco1b1/";
const THIOPURINE_URL: &str = "https://cpicpgx.org/guidelines/guideline-for-thiopurines-and-tpmt-and-nudt15/";
const FLUOROPYRIMIDINE_URL: &str = "https://cpicpgx.org/guidelines/guideline-for-fluoropyrimidines-and-dpyd/";

/// drug, gene, phenotype, risk, recommendation, mechanism, evidence level, guideline URL
type InteractionSeed = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
);

#[rustfmt::skip]
const INTERACTIONS: &[InteractionSeed] = &[
    // CYP2D6
    ("codeine", "CYP2D6", URM, TOXIC,
        "AVOID codeine. Use alternative analgesic not metabolized by CYP2D6 (e.g., morphine, non-opioids).",
        "CYP2D6 ultra-rapid metabolizers convert codeine to morphine at extremely high rates, leading to potentially fatal respiratory depression.",
        "A", CODEINE_URL),
    ("codeine", "CYP2D6", NM, SAFE,
        "Use codeine per standard dosing guidelines.",
        "Normal CYP2D6 activity produces expected morphine levels from codeine.",
        "A", ""),
    ("codeine", "CYP2D6", IM, ADJUST,
        "Use codeine with caution at reduced dose, or consider alternative analgesic.",
        "Reduced CYP2D6 activity leads to lower morphine formation; analgesic effect may be diminished.",
        "A", ""),
    ("codeine", "CYP2D6", PM, INEFFECTIVE,
        "AVOID codeine. Use alternative analgesic. Codeine will provide insufficient pain relief.",
        "CYP2D6 poor metabolizers cannot convert codeine to its active metabolite morphine, rendering it ineffective.",
        "A", ""),

    ("tramadol", "CYP2D6", URM, TOXIC,
        "AVOID tramadol. Risk of respiratory depression and seizures.",
        "Ultra-rapid CYP2D6 metabolism converts tramadol to O-desmethyltramadol at dangerously high rates.",
        "A", ""),
    ("tramadol", "CYP2D6", NM, SAFE,
        "Use tramadol per standard dosing.",
        "Normal CYP2D6 metabolism produces expected levels of active metabolite.",
        "A", ""),
    ("tramadol", "CYP2D6", IM, ADJUST,
        "Use tramadol with caution; consider lower dose or alternative.",
        "Intermediate CYP2D6 activity may reduce active metabolite formation.",
        "A", ""),
    ("tramadol", "CYP2D6", PM, INEFFECTIVE,
        "AVOID tramadol. Consider alternative analgesic.",
        "Poor CYP2D6 metabolism prevents formation of the active O-desmethyltramadol metabolite.",
        "A", ""),

    ("tamoxifen", "CYP2D6", URM, SAFE,
        "Use tamoxifen per standard dosing.",
        "Adequate endoxifen formation with ultra-rapid CYP2D6 metabolism.",
        "A", ""),
    ("tamoxifen", "CYP2D6", NM, SAFE,
        "Use tamoxifen per standard dosing (20 mg/day).",
        "Normal CYP2D6 converts tamoxifen to endoxifen at therapeutic levels.",
        "A", ""),
    ("tamoxifen", "CYP2D6", IM, ADJUST,
        "Consider higher dose (40 mg/day) or alternative (aromatase inhibitor if post-menopausal).",
        "Reduced CYP2D6 activity decreases endoxifen formation, possibly lowering efficacy for breast cancer treatment.",
        "A", ""),
    ("tamoxifen", "CYP2D6", PM, INEFFECTIVE,
        "AVOID tamoxifen. Use aromatase inhibitor (if post-menopausal) or alternative endocrine therapy.",
        "CYP2D6 poor metabolizers produce subtherapeutic endoxifen levels, compromising tamoxifen's anti-cancer efficacy.",
        "A", ""),

    // CYP2C19
    ("clopidogrel", "CYP2C19", URM, SAFE,
        "Use clopidogrel per standard dosing.",
        "Ultra-rapid CYP2C19 metabolism provides enhanced activation of clopidogrel to its active thiol metabolite.",
        "A", ""),
    ("clopidogrel", "CYP2C19", NM, SAFE,
        "Use clopidogrel per standard dosing (75 mg/day).",
        "Normal CYP2C19 function activates clopidogrel adequately for anti-platelet effect.",
        "A", ""),
    ("clopidogrel", "CYP2C19", IM, ADJUST,
        "Consider alternative antiplatelet (prasugrel or ticagrelor) if undergoing PCI.",
        "Reduced CYP2C19 function decreases clopidogrel bioactivation, increasing risk of cardiovascular events.",
        "A", ""),
    ("clopidogrel", "CYP2C19", PM, INEFFECTIVE,
        "Use ALTERNATIVE antiplatelet agent (prasugrel or ticagrelor). Clopidogrel will not provide adequate platelet inhibition.",
        "CYP2C19 poor metabolizers cannot bioactivate clopidogrel, leading to treatment failure and increased thrombotic risk.",
        "A", ""),

    ("omeprazole", "CYP2C19", URM, INEFFECTIVE,
        "Increase dose to 2-3× standard or use alternative PPI (rabeprazole).",
        "Ultra-rapid CYP2C19 metabolism clears omeprazole too quickly for adequate acid suppression.",
        "A", ""),
    ("omeprazole", "CYP2C19", NM, SAFE,
        "Use omeprazole per standard dosing (20 mg/day).",
        "Normal CYP2C19 activity provides expected omeprazole pharmacokinetics.",
        "A", ""),
    ("omeprazole", "CYP2C19", IM, SAFE,
        "Use omeprazole per standard dosing. Slightly elevated drug levels are clinically beneficial.",
        "Intermediate CYP2C19 metabolism results in higher omeprazole exposure, which may improve acid suppression.",
        "A", ""),
    ("omeprazole", "CYP2C19", PM, ADJUST,
        "Consider 50% dose reduction. Monitor for adverse effects.",
        "CYP2C19 poor metabolizers have markedly elevated omeprazole exposure (up to 10×), increasing risk of adverse effects.",
        "A", ""),

    ("escitalopram", "CYP2C19", URM, INEFFECTIVE,
        "Consider alternative SSRI not metabolized by CYP2C19 or increase dose with monitoring.",
        "Ultra-rapid CYP2C19 metabolism may result in subtherapeutic escitalopram levels.",
        "A", ""),
    ("escitalopram", "CYP2C19", NM, SAFE,
        "Use escitalopram per standard dosing (10-20 mg/day).",
        "Normal CYP2C19 metabolism provides expected escitalopram exposure.",
        "A", ""),
    ("escitalopram", "CYP2C19", IM, SAFE,
        "Use escitalopram per standard dosing.",
        "Intermediate CYP2C19 metabolism has modest impact on escitalopram levels.",
        "A", ""),
    ("escitalopram", "CYP2C19", PM, ADJUST,
        "Reduce dose by 50%. Consider alternative SSRI if adverse effects occur.",
        "CYP2C19 poor metabolizers have significantly elevated escitalopram plasma concentrations, increasing side-effect risk.",
        "A", ""),

    ("voriconazole", "CYP2C19", URM, INEFFECTIVE,
        "Use alternative antifungal agent or increase dose with therapeutic drug monitoring.",
        "Ultra-rapid CYP2C19 metabolism clears voriconazole too rapidly for adequate antifungal activity.",
        "A", ""),
    ("voriconazole", "CYP2C19", NM, SAFE,
        "Use voriconazole per standard dosing.",
        "Normal CYP2C19 function provides expected voriconazole pharmacokinetics.",
        "A", ""),
    ("voriconazole", "CYP2C19", IM, SAFE,
        "Use voriconazole per standard dosing.",
        "Intermediate CYP2C19 metabolism has minimal clinical impact on voriconazole levels.",
        "A", ""),
    ("voriconazole", "CYP2C19", PM, TOXIC,
        "Reduce dose by 50% or use alternative antifungal. Monitor trough levels closely.",
        "CYP2C19 poor metabolizers have dramatically elevated voriconazole exposure, risking hepatotoxicity and visual disturbances.",
        "A", ""),

    // CYP2C9
    ("warfarin", "CYP2C9", NM, SAFE,
        "Use standard warfarin dosing algorithm with INR monitoring.",
        "Normal CYP2C9 metabolism clears S-warfarin at expected rates.",
        "A", WARFARIN_URL),
    ("warfarin", "CYP2C9", IM, ADJUST,
        "Reduce initial dose by 25-50%. Increase INR monitoring frequency.",
        "Reduced CYP2C9 function decreases S-warfarin clearance, increasing bleeding risk at standard doses.",
        "A", ""),
    ("warfarin", "CYP2C9", PM, TOXIC,
        "Reduce initial dose by 50-80%. Use frequent INR monitoring. Consider alternative anticoagulant (DOAC).",
        "CYP2C9 poor metabolizers accumulate S-warfarin to dangerously high levels, causing severe bleeding risk.",
        "A", ""),

    ("celecoxib", "CYP2C9", NM, SAFE,
        "Use celecoxib per standard dosing.",
        "Normal CYP2C9 metabolism provides expected celecoxib clearance.",
        "A", ""),
    ("celecoxib", "CYP2C9", IM, ADJUST,
        "Reduce starting dose by 50%. Use lowest effective dose.",
        "Intermediate CYP2C9 metabolism results in elevated celecoxib exposure.",
        "A", ""),
    ("celecoxib", "CYP2C9", PM, TOXIC,
        "Reduce dose by 75% or avoid celecoxib. Use alternative NSAID or analgesic.",
        "CYP2C9 poor metabolizers have significantly impaired celecoxib clearance, increasing GI and cardiovascular toxicity risk.",
        "A", ""),

    ("phenytoin", "CYP2C9", NM, SAFE,
        "Use phenytoin per standard dosing with therapeutic drug monitoring.",
        "Normal CYP2C9 function provides expected phenytoin pharmacokinetics.",
        "A", ""),
    ("phenytoin", "CYP2C9", IM, ADJUST,
        "Reduce dose by 25%. Monitor phenytoin levels closely.",
        "Reduced CYP2C9 activity leads to higher phenytoin levels and narrower therapeutic window.",
        "A", ""),
    ("phenytoin", "CYP2C9", PM, TOXIC,
        "Reduce dose by 50% or use alternative antiepileptic. Monitor drug levels closely.",
        "CYP2C9 poor metabolizers accumulate phenytoin, risking CNS toxicity (ataxia, nystagmus, seizures).",
        "A", ""),

    // SLCO1B1
    ("simvastatin", "SLCO1B1", NM, SAFE,
        "Use simvastatin per standard dosing (up to 40 mg/day).",
        "Normal SLCO1B1 transporter function provides adequate hepatic uptake of simvastatin acid.",
        "A", SIMVASTATIN_URL),
    ("simvastatin", "SLCO1B1", IM, ADJUST,
        "Limit simvastatin to ≤20 mg/day or use alternative statin (rosuvastatin/pravastatin).",
        "Reduced SLCO1B1 function increases systemic simvastatin acid exposure, raising myopathy risk (OR ~2.6 per *5 allele).",
        "A", ""),
    ("simvastatin", "SLCO1B1", PM, TOXIC,
        "AVOID simvastatin. Use alternative statin (rosuvastatin or pravastatin at lowest effective dose).",
        "SLCO1B1 poor function causes dramatically elevated simvastatin acid levels, with ~18× increased myopathy risk including rhabdomyolysis.",
        "A", ""),

    ("atorvastatin", "SLCO1B1", NM, SAFE,
        "Use atorvastatin per standard dosing.",
        "Normal SLCO1B1 function provides expected hepatic uptake of atorvastatin.",
        "B", ""),
    ("atorvastatin", "SLCO1B1", IM, ADJUST,
        "Use lower dose atorvastatin or consider pravastatin/rosuvastatin.",
        "Reduced SLCO1B1 function modestly increases atorvastatin systemic exposure.",
        "B", ""),
    ("atorvastatin", "SLCO1B1", PM, ADJUST,
        "Use lowest effective dose or switch to pravastatin/rosuvastatin. Monitor for muscle symptoms.",
        "Poor SLCO1B1 function significantly increases atorvastatin exposure and myopathy risk.",
        "B", ""),

    // TPMT
    ("azathioprine", "TPMT", NM, SAFE,
        "Use azathioprine per standard dosing (2-3 mg/kg/day).",
        "Normal TPMT activity provides expected thiopurine metabolism and safe thioguanine nucleotide (TGN) levels.",
        "A", THIOPURINE_URL),
    ("azathioprine", "TPMT", IM, ADJUST,
        "Reduce dose to 30-70% of standard. Monitor CBC weekly for first months.",
        "Intermediate TPMT activity causes higher TGN accumulation, increasing myelosuppression risk.",
        "A", ""),
    ("azathioprine", "TPMT", PM, TOXIC,
        "Reduce dose to 10% of standard or AVOID. Use alternative immunosuppressant. Mandatory CBC monitoring.",
        "TPMT-deficient patients accumulate lethal TGN concentrations, causing severe/fatal myelosuppression (pancytopenia).",
        "A", ""),

    ("mercaptopurine", "TPMT", NM, SAFE,
        "Use mercaptopurine per protocol dosing.",
        "Normal TPMT activity provides safe thiopurine metabolism.",
        "A", ""),
    ("mercaptopurine", "TPMT", IM, ADJUST,
        "Reduce dose to 30-70% of standard. Monitor CBC closely.",
        "Intermediate TPMT activity increases TGN accumulation and myelosuppression risk.",
        "A", ""),
    ("mercaptopurine", "TPMT", PM, TOXIC,
        "Reduce dose to 10% of standard or AVOID. Mandatory intensive CBC monitoring.",
        "TPMT deficiency causes dangerous TGN accumulation and life-threatening myelotoxicity.",
        "A", ""),

    // DPYD
    ("fluorouracil", "DPYD", NM, SAFE,
        "Use 5-fluorouracil per standard dosing.",
        "Normal DPD enzyme activity provides expected fluorouracil catabolism.",
        "A", FLUOROPYRIMIDINE_URL),
    ("fluorouracil", "DPYD", IM, ADJUST,
        "Reduce initial dose by 50%. Titrate based on toxicity and efficacy.",
        "Reduced DPD activity impairs fluorouracil catabolism, increasing exposure and toxicity risk (mucositis, myelosuppression).",
        "A", ""),
    ("fluorouracil", "DPYD", PM, TOXIC,
        "AVOID fluorouracil and all fluoropyrimidines. Use alternative chemotherapy.",
        "DPD-deficient patients cannot catabolize fluorouracil, resulting in severe/fatal toxicity (mucositis, neutropenia, neurotoxicity).",
        "A", ""),

    ("capecitabine", "DPYD", NM, SAFE,
        "Use capecitabine per standard dosing.",
        "Normal DPD activity provides expected capecitabine/fluorouracil metabolism.",
        "A", ""),
    ("capecitabine", "DPYD", IM, ADJUST,
        "Reduce initial dose by 50%. Monitor closely for toxicity.",
        "Reduced DPD activity impairs fluoropyrimidine catabolism, increasing toxicity risk.",
        "A", ""),
    ("capecitabine", "DPYD", PM, TOXIC,
        "AVOID capecitabine. Use alternative chemotherapy regimen.",
        "DPD deficiency causes life-threatening fluoropyrimidine toxicity.",
        "A", ""),
];

/// The curated interaction table as owned rows
pub fn interactions() -> Vec<DrugGeneInteraction> {
    INTERACTIONS
        .iter()
        .map(
            |&(drug, gene, phenotype, risk, recommendation, mechanism, level, url)| DrugGeneInteraction {
                drug: drug.to_string(),
                gene: gene.to_string(),
                phenotype: Phenotype::from_label(phenotype, None),
                risk: RiskLabel::from_label(risk),
                recommendation: recommendation.to_string(),
                mechanism: mechanism.to_string(),
                evidence_level: level.to_string(),
                guideline_url: Some(url.to_string()).filter(|u| !u.is_empty()),
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_interaction_labels_parse() {
        for ix in interactions() {
            assert!(ix.phenotype.rank().is_some(), "bad phenotype in {:?}", ix);
            assert_ne!(ix.risk, RiskLabel::Unknown, "bad risk in {:?}", ix);
        }
    }

    #[test]
    fn test_interaction_triples_unique() {
        let rows = interactions();
        let keys: HashSet<_> = rows
            .iter()
            .map(|ix| (ix.drug.clone(), ix.gene.clone(), ix.phenotype.clone()))
            .collect();
        assert_eq!(keys.len(), rows.len());
    }

    #[test]
    fn test_rsids_point_at_curated_alleles() {
        for (rsid, gene, allele) in RSID_ALLELES {
            let (_, alleles) = ALLELE_FUNCTIONS
                .iter()
                .find(|(g, _)| g == gene)
                .unwrap_or_else(|| panic!("{} has no curated gene", rsid));
            assert!(
                alleles.iter().any(|(a, _)| a == allele),
                "{} maps to uncurated {} {}",
                rsid,
                gene,
                allele
            );
        }
    }
}
