use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Grouping of methods that share a default vendor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodCategory {
    CoreStockApis,
    TechnicalIndicators,
    FundamentalData,
    NewsData,
}

impl MethodCategory {
    pub const ALL: [Self; 4] = [
        Self::CoreStockApis,
        Self::TechnicalIndicators,
        Self::FundamentalData,
        Self::NewsData,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CoreStockApis => "core_stock_apis",
            Self::TechnicalIndicators => "technical_indicators",
            Self::FundamentalData => "fundamental_data",
            Self::NewsData => "news_data",
        }
    }
}

impl Display for MethodCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodCategory {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownCategory {
                value: value.to_string(),
            })
    }
}

/// Logical data-retrieval operation, independent of the vendor serving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataMethod {
    GetStockData,
    GetIndicators,
    GetFundamentals,
    GetBalanceSheet,
    GetCashflow,
    GetIncomeStatement,
    GetNews,
    GetGlobalNews,
    GetInsiderSentiment,
    GetInsiderTransactions,
}

impl DataMethod {
    pub const ALL: [Self; 10] = [
        Self::GetStockData,
        Self::GetIndicators,
        Self::GetFundamentals,
        Self::GetBalanceSheet,
        Self::GetCashflow,
        Self::GetIncomeStatement,
        Self::GetNews,
        Self::GetGlobalNews,
        Self::GetInsiderSentiment,
        Self::GetInsiderTransactions,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetStockData => "get_stock_data",
            Self::GetIndicators => "get_indicators",
            Self::GetFundamentals => "get_fundamentals",
            Self::GetBalanceSheet => "get_balance_sheet",
            Self::GetCashflow => "get_cashflow",
            Self::GetIncomeStatement => "get_income_statement",
            Self::GetNews => "get_news",
            Self::GetGlobalNews => "get_global_news",
            Self::GetInsiderSentiment => "get_insider_sentiment",
            Self::GetInsiderTransactions => "get_insider_transactions",
        }
    }

    pub const fn category(self) -> MethodCategory {
        match self {
            Self::GetStockData => MethodCategory::CoreStockApis,
            Self::GetIndicators => MethodCategory::TechnicalIndicators,
            Self::GetFundamentals
            | Self::GetBalanceSheet
            | Self::GetCashflow
            | Self::GetIncomeStatement => MethodCategory::FundamentalData,
            Self::GetNews
            | Self::GetGlobalNews
            | Self::GetInsiderSentiment
            | Self::GetInsiderTransactions => MethodCategory::NewsData,
        }
    }

    /// Optional methods degrade to a placeholder instead of failing.
    /// Only core price data is required.
    pub const fn is_optional(self) -> bool {
        !matches!(self, Self::GetStockData)
    }

    /// Whether the method is keyed by an instrument.
    pub const fn needs_symbol(self) -> bool {
        !matches!(self, Self::GetGlobalNews)
    }

    pub const fn returns_prices(self) -> bool {
        matches!(self, Self::GetStockData)
    }
}

impl Display for DataMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataMethod {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownMethod {
                value: value.to_string(),
            })
    }
}
