//! Platform-internal coded enumerations.
//!
//! Each category maps free text from an external site to a stable numeric
//! code. Mapping is keyword containment in declaration order; the first
//! variant with a matching keyword wins and unmapped text yields `None`.

use serde::{Deserialize, Serialize};

macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $code:literal => [$($keyword:literal),+ $(,)?]),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stored code.
            pub fn code(self) -> i16 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn from_code(code: i16) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Canonical display label (the first keyword).
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => [$($keyword),+][0]),+
                }
            }

            /// Map free text to a code; `None` when nothing matches.
            pub fn from_label(text: &str) -> Option<Self> {
                let text = text.trim();
                if text.is_empty() {
                    return None;
                }
                $(
                    if [$($keyword),+].iter().any(|k| text.contains(k)) {
                        return Some($name::$variant);
                    }
                )+
                None
            }
        }
    };
}

coded_enum! {
    /// Industry of the hiring company.
    pub enum Industry {
        ItTelecom = 1 => ["IT・通信", "IT", "通信", "インターネット", "ソフトウェア", "Web"],
        Manufacturing = 2 => ["メーカー", "製造"],
        Trading = 3 => ["商社"],
        Finance = 4 => ["金融", "銀行", "証券", "保険"],
        RealEstateConstruction = 5 => ["不動産・建設", "不動産", "建設", "建築"],
        Consulting = 6 => ["コンサルティング", "コンサル"],
        AdvertisingMedia = 7 => ["広告・メディア", "広告", "メディア", "出版"],
        MedicalWelfare = 8 => ["医療・福祉", "医療", "福祉", "介護", "製薬"],
        RetailDistribution = 9 => ["小売・流通", "小売", "流通", "物流"],
        Service = 10 => ["サービス", "人材", "飲食", "ホテル"],
    }
}

coded_enum! {
    /// Occupation of the posting.
    pub enum Occupation {
        Sales = 1 => ["営業"],
        Engineer = 2 => ["エンジニア", "開発", "SE", "プログラマ"],
        Marketing = 3 => ["マーケティング", "企画"],
        Administration = 4 => ["事務", "管理部門", "経理", "人事", "総務", "法務"],
        Consultant = 5 => ["コンサルタント"],
        Creative = 6 => ["クリエイティブ", "デザイナー", "編集"],
        Medical = 7 => ["医療専門職", "看護", "薬剤師"],
        Engineering = 8 => ["技術職", "設計", "施工管理", "生産技術"],
        Executive = 9 => ["経営", "役員", "CxO"],
        ServiceStaff = 10 => ["販売", "接客", "サービス職"],
    }
}

coded_enum! {
    /// Employment status of the posting.
    pub enum EmploymentStatus {
        FullTime = 1 => ["正社員"],
        Contract = 2 => ["契約社員"],
        Temporary = 3 => ["派遣"],
        PartTime = 4 => ["アルバイト", "パート"],
        Outsourcing = 5 => ["業務委託"],
        Executive = 6 => ["役員"],
    }
}

coded_enum! {
    /// Gender requirement.
    pub enum Gender {
        Unspecified = 0 => ["不問", "男女"],
        Male = 1 => ["男性"],
        Female = 2 => ["女性"],
    }
}

coded_enum! {
    /// Holiday policy.
    pub enum HolidayType {
        FullTwoDaysWeekly = 1 => ["完全週休2日", "完全週休二日"],
        TwoDaysWeekly = 2 => ["週休2日", "週休二日"],
        Shift = 3 => ["シフト"],
        Other = 9 => ["その他の休日"],
    }
}

coded_enum! {
    /// Minimum final education.
    pub enum FinalEducation {
        Graduate = 1 => ["大学院"],
        University = 2 => ["大学", "大卒"],
        Junior = 3 => ["短大", "高専", "専門"],
        HighSchool = 4 => ["高校", "高卒"],
        Unspecified = 9 => ["学歴不問"],
    }
}

coded_enum! {
    /// Japanese prefecture, coded by JIS X 0401.
    pub enum Prefecture {
        Hokkaido = 1 => ["北海道"],
        Aomori = 2 => ["青森"],
        Iwate = 3 => ["岩手"],
        Miyagi = 4 => ["宮城"],
        Akita = 5 => ["秋田"],
        Yamagata = 6 => ["山形"],
        Fukushima = 7 => ["福島"],
        Ibaraki = 8 => ["茨城"],
        Tochigi = 9 => ["栃木"],
        Gunma = 10 => ["群馬"],
        Saitama = 11 => ["埼玉"],
        Chiba = 12 => ["千葉"],
        Tokyo = 13 => ["東京"],
        Kanagawa = 14 => ["神奈川"],
        Niigata = 15 => ["新潟"],
        Toyama = 16 => ["富山"],
        Ishikawa = 17 => ["石川"],
        Fukui = 18 => ["福井"],
        Yamanashi = 19 => ["山梨"],
        Nagano = 20 => ["長野"],
        Gifu = 21 => ["岐阜"],
        Shizuoka = 22 => ["静岡"],
        Aichi = 23 => ["愛知"],
        Mie = 24 => ["三重"],
        Shiga = 25 => ["滋賀"],
        Kyoto = 26 => ["京都"],
        Osaka = 27 => ["大阪"],
        Hyogo = 28 => ["兵庫"],
        Nara = 29 => ["奈良"],
        Wakayama = 30 => ["和歌山"],
        Tottori = 31 => ["鳥取"],
        Shimane = 32 => ["島根"],
        Okayama = 33 => ["岡山"],
        Hiroshima = 34 => ["広島"],
        Yamaguchi = 35 => ["山口"],
        Tokushima = 36 => ["徳島"],
        Kagawa = 37 => ["香川"],
        Ehime = 38 => ["愛媛"],
        Kochi = 39 => ["高知"],
        Fukuoka = 40 => ["福岡"],
        Saga = 41 => ["佐賀"],
        Nagasaki = 42 => ["長崎"],
        Kumamoto = 43 => ["熊本"],
        Oita = 44 => ["大分"],
        Miyazaki = 45 => ["宮崎"],
        Kagoshima = 46 => ["鹿児島"],
        Okinawa = 47 => ["沖縄"],
    }
}

/// Map each phrase of a delimited list, dropping unmapped phrases.
///
/// Duplicates are kept; the batch cleanup pass removes them.
pub fn map_phrases<T>(text: &str, map: impl Fn(&str) -> Option<T>) -> Vec<T> {
    text.split(['/', '／', '、', ',', '，', '・', '\n', '|'])
        .filter_map(|phrase| map(phrase))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefecture_tokyo_not_kyoto() {
        assert_eq!(Prefecture::from_label("東京都"), Some(Prefecture::Tokyo));
        assert_eq!(Prefecture::from_label("京都府"), Some(Prefecture::Kyoto));
        assert_eq!(Prefecture::Tokyo.code(), 13);
    }

    #[test]
    fn test_unmapped_is_none() {
        assert_eq!(Industry::from_label("宇宙開発"), None);
        assert_eq!(EmploymentStatus::from_label(""), None);
    }

    #[test]
    fn test_code_roundtrip() {
        for industry in Industry::ALL {
            assert_eq!(Industry::from_code(industry.code()), Some(*industry));
        }
    }

    #[test]
    fn test_map_phrases_keeps_duplicates() {
        let codes = map_phrases("銀行／証券、不明", Industry::from_label);
        assert_eq!(codes, vec![Industry::Finance, Industry::Finance]);
    }

    #[test]
    fn test_full_two_days_before_two_days() {
        assert_eq!(
            HolidayType::from_label("完全週休2日制（土日祝）"),
            Some(HolidayType::FullTwoDaysWeekly)
        );
        assert_eq!(HolidayType::from_label("週休2日制"), Some(HolidayType::TwoDaysWeekly));
    }
}
