/// Public name of the train operator with the given ATOC code.
pub fn operator_name(atoc_code: &str) -> Option<&'static str> {
    Some(match atoc_code {
        "EU" => "Virtual European Path",
        "AR" => "Alliance Rail",
        "NT" => "Northern",
        "AW" => "Transport for Wales",
        "CC" => "c2c",
        "CS" => "Caledonian Sleeper",
        "CH" => "Chiltern Railways",
        "XC" => "CrossCountry",
        "EM" => "East Midlands Railway",
        "ES" => "Eurostar",
        "FC" => "First Capital Connect",
        "HT" => "Hull Trains",
        "GX" => "Gatwick Express",
        "GN" => "Great Northern",
        "TL" => "Thameslink",
        "GC" => "Grand Central",
        "GW" => "Great Western Railway",
        "LE" => "Greater Anglia",
        "HC" => "Heathrow Connect",
        "HX" => "Heathrow Express",
        "IL" => "Island Line",
        "LS" => "Locomotive Services",
        "LM" => "West Midlands Trains",
        "LO" => "London Overground",
        "LT" => "London Underground",
        "ME" => "Merseyrail",
        "LR" => "Network Rail",
        "TW" => "Tyne & Wear Metro",
        "NY" => "North Yorkshire Moors Railway",
        "SR" => "ScotRail",
        "SW" => "South Western Railway",
        "SJ" => "South Yorkshire Supertram",
        "SE" => "Southeastern",
        "SN" => "Southern",
        "SP" => "Swanage Railway",
        "XR" => "Elizabeth line",
        "TP" => "TransPennine Express",
        "VT" => "Avanti West Coast",
        "GR" => "LNER",
        "WR" => "West Coast Railway Company",
        "WS" => "Wrexham and Shropshire",
        "TY" => "Vintage Trains",
        "LD" => "Lumo",
        "SO" => "SLC Operations",
        "LF" => "Grand Union Trains",
        "MV" => "Varamis Rail",
        "PT" => "Europorte 2",
        "YG" => "Hanson & Hall",
        // ZZ is "no operator"; anything else is simply unknown to us
        _ => return None,
    })
}
