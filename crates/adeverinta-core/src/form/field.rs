//! The closed set of form fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::SchemaError;
use crate::text;

/// A field of the certificate request form.
///
/// The set is closed: collected data, collaborator payloads and prompts may
/// only reference these sixteen names. Declaration order is the order in
/// which missing fields are requested.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    NumePrenumeComplet,
    NumarMatricol,
    SituatieStudent,
    NivelStudiu,
    RegimStudiu,
    AnStudiu,
    Specializare,
    PersoanaBeneficiar,
    InstitutieDestinatie,
    JudetSauTara,
    Motiv,
    EchivalareDisciplina,
    MediePeAdeverinta,
    TipMedie,
    Telefon,
    Email,
}

impl FieldName {
    /// Every field, in declaration order.
    pub const ALL: [FieldName; 16] = [
        FieldName::NumePrenumeComplet,
        FieldName::NumarMatricol,
        FieldName::SituatieStudent,
        FieldName::NivelStudiu,
        FieldName::RegimStudiu,
        FieldName::AnStudiu,
        FieldName::Specializare,
        FieldName::PersoanaBeneficiar,
        FieldName::InstitutieDestinatie,
        FieldName::JudetSauTara,
        FieldName::Motiv,
        FieldName::EchivalareDisciplina,
        FieldName::MediePeAdeverinta,
        FieldName::TipMedie,
        FieldName::Telefon,
        FieldName::Email,
    ];

    /// The wire identifier (snake_case).
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::NumePrenumeComplet => "nume_prenume_complet",
            FieldName::NumarMatricol => "numar_matricol",
            FieldName::SituatieStudent => "situatie_student",
            FieldName::NivelStudiu => "nivel_studiu",
            FieldName::RegimStudiu => "regim_studiu",
            FieldName::AnStudiu => "an_studiu",
            FieldName::Specializare => "specializare",
            FieldName::PersoanaBeneficiar => "persoana_beneficiar",
            FieldName::InstitutieDestinatie => "institutie_destinatie",
            FieldName::JudetSauTara => "judet_sau_tara",
            FieldName::Motiv => "motiv",
            FieldName::EchivalareDisciplina => "echivalare_disciplina",
            FieldName::MediePeAdeverinta => "medie_pe_adeverinta",
            FieldName::TipMedie => "tip_medie",
            FieldName::Telefon => "telefon",
            FieldName::Email => "email",
        }
    }

    /// Human label used when asking for the field.
    pub fn label(&self) -> &'static str {
        match self {
            FieldName::NumePrenumeComplet => "numele si prenumele complet",
            FieldName::NumarMatricol => "numarul matricol",
            FieldName::SituatieStudent => "situatia ta (student in prezent, absolvent sau retras)",
            FieldName::NivelStudiu => "nivelul de studiu (licenta sau master)",
            FieldName::RegimStudiu => "regimul de studiu (buget, taxa sau prelungire studii)",
            FieldName::AnStudiu => "anul de studiu",
            FieldName::Specializare => "specializarea",
            FieldName::PersoanaBeneficiar => "beneficiarul adeverintei (- daca este pentru tine)",
            FieldName::InstitutieDestinatie => "institutia unde depui adeverinta (- daca nu se aplica)",
            FieldName::JudetSauTara => "judetul sau tara (- daca nu se aplica)",
            FieldName::Motiv => "motivul pentru care ai nevoie de adeverinta",
            FieldName::EchivalareDisciplina => "disciplina pentru echivalare",
            FieldName::MediePeAdeverinta => "daca vrei media pe adeverinta (Da sau Nu)",
            FieldName::TipMedie => "tipul mediei (medie admitere, medie semestru anterior sau medie an anterior)",
            FieldName::Telefon => "numarul de telefon",
            FieldName::Email => "adresa de email",
        }
    }

    /// Phrases that, found in a question, mean the question asks for this
    /// field. The identifier itself always counts as a mention.
    pub fn mention_keywords(&self) -> &'static [&'static str] {
        match self {
            FieldName::NumePrenumeComplet => &["numele", "nume si prenume", "numele complet"],
            FieldName::NumarMatricol => &["matricol", "numarul matricol", "numar matricol"],
            FieldName::SituatieStudent => &["situatia", "situatia ta", "absolvent", "retras"],
            FieldName::NivelStudiu => &["nivelul", "licenta", "master"],
            FieldName::RegimStudiu => &["regimul", "buget", "taxa"],
            FieldName::AnStudiu => &["anul de studiu", "an de studiu", "in ce an"],
            FieldName::Specializare => &["specializarea", "specializare"],
            FieldName::PersoanaBeneficiar => &["beneficiarul", "beneficiar", "pentru cine"],
            FieldName::InstitutieDestinatie => &["institutia", "institutie"],
            FieldName::JudetSauTara => &["judetul", "judet", "tara"],
            FieldName::Motiv => &["motivul", "motiv"],
            FieldName::EchivalareDisciplina => {
                &["disciplina pentru echivalare", "disciplina de echivalat", "ce disciplina"]
            }
            FieldName::MediePeAdeverinta => &["media pe adeverinta", "medie pe adeverinta"],
            FieldName::TipMedie => &["tipul mediei", "tip medie", "ce medie"],
            FieldName::Telefon => &["telefon", "telefonul"],
            FieldName::Email => &["email", "e mail", "adresa de mail"],
        }
    }

    /// Whether `question` refers to this field by identifier or keyword.
    pub fn is_mentioned_in(&self, question: &str) -> bool {
        if text::contains_phrase(question, self.as_str()) {
            return true;
        }
        self.mention_keywords()
            .iter()
            .any(|kw| text::contains_phrase(question, kw))
    }

    /// All fields a question refers to, in declaration order.
    pub fn mentioned_in(question: &str) -> Vec<FieldName> {
        Self::ALL
            .iter()
            .copied()
            .filter(|f| f.is_mentioned_in(question))
            .collect()
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| SchemaError::UnknownField(wanted.to_string()))
    }
}
