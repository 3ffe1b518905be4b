use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Country {
    AR,
    US,
    BR,
    CL,
}

impl Country {
    pub fn code(&self) -> &'static str {
        match self {
            Country::AR => "AR",
            Country::US => "US",
            Country::BR => "BR",
            Country::CL => "CL",
        }
    }

    pub fn currency(&self) -> Currency {
        match self {
            Country::AR => Currency::ARS,
            Country::US => Currency::USD,
            Country::BR => Currency::BRL,
            Country::CL => Currency::CLP,
        }
    }

    /// Browser locale presented to the storefront
    pub fn locale(&self) -> &'static str {
        match self {
            Country::AR => "es-AR",
            Country::US => "en-US",
            Country::BR => "pt-BR",
            Country::CL => "es-CL",
        }
    }

    pub fn accept_language(&self) -> &'static str {
        match self {
            Country::AR => "es-AR,es;q=0.9",
            Country::US => "en-US,en;q=0.9",
            Country::BR => "pt-BR,pt;q=0.9",
            Country::CL => "es-CL,es;q=0.9",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    ARS,
    USD,
    BRL,
    CLP,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::ARS => "ARS",
            Currency::USD => "USD",
            Currency::BRL => "BRL",
            Currency::CLP => "CLP",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "ARS" => Some(Currency::ARS),
            "USD" => Some(Currency::USD),
            "BRL" => Some(Currency::BRL),
            "CLP" => Some(Currency::CLP),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Nike,
    Adidas,
}

impl Vendor {
    pub fn key(&self) -> &'static str {
        match self {
            Vendor::Nike => "nike",
            Vendor::Adidas => "adidas",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Vendor::Nike => "Nike",
            Vendor::Adidas => "Adidas",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
