//! Base, array and range type rows missing from the engine's own
//! `pg_type`. Tuples are `(oid, typname, typlen, typcategory, preferred,
//! typelem, typarray)`; `typtype` is derived from the category.

pub(crate) type PgTypeRow = (u32, &'static str, i16, &'static str, bool, u32, u32);

pub(crate) const SUPPLEMENTAL_PG_TYPES: &[PgTypeRow] = &[
    // base types
    (16, "bool", 1, "B", true, 0, 1000),
    (17, "bytea", -1, "U", false, 0, 1001),
    (18, "char", 1, "Z", false, 0, 1002),
    (19, "name", 64, "S", false, 18, 1003),
    (20, "int8", 8, "N", false, 0, 1016),
    (21, "int2", 2, "N", false, 0, 1005),
    (22, "int2vector", -1, "A", false, 21, 1006),
    (23, "int4", 4, "N", false, 0, 1007),
    (24, "regproc", 4, "N", false, 0, 1008),
    (25, "text", -1, "S", true, 0, 1009),
    (26, "oid", 4, "N", false, 0, 1028),
    (27, "tid", 6, "U", false, 0, 1010),
    (28, "xid", 4, "U", false, 0, 1011),
    (29, "cid", 4, "U", false, 0, 1012),
    (30, "oidvector", -1, "A", false, 26, 1013),
    (114, "json", -1, "U", false, 0, 199),
    (142, "xml", -1, "U", false, 0, 143),
    (194, "pg_node_tree", -1, "Z", false, 0, 0),
    (600, "point", 16, "G", false, 701, 1017),
    (601, "lseg", 32, "G", false, 600, 1018),
    (602, "path", -1, "G", false, 0, 1019),
    (603, "box", 32, "G", false, 600, 1020),
    (604, "polygon", -1, "G", false, 0, 1027),
    (628, "line", 24, "G", false, 701, 629),
    (650, "cidr", -1, "I", false, 0, 651),
    (700, "float4", 4, "N", false, 0, 1021),
    (701, "float8", 8, "N", true, 0, 1022),
    (718, "circle", 24, "G", false, 0, 719),
    (774, "macaddr8", 8, "U", false, 0, 775),
    (790, "money", 8, "N", false, 0, 791),
    (829, "macaddr", 6, "U", false, 0, 1040),
    (869, "inet", -1, "I", true, 0, 1041),
    (1033, "aclitem", 12, "U", false, 0, 1034),
    (1042, "bpchar", -1, "S", false, 0, 1014),
    (1043, "varchar", -1, "S", false, 0, 1015),
    (1082, "date", 4, "D", false, 0, 1182),
    (1083, "time", 8, "D", false, 0, 1183),
    (1114, "timestamp", 8, "D", false, 0, 1115),
    (1184, "timestamptz", 8, "D", true, 0, 1185),
    (1186, "interval", 16, "T", true, 0, 1187),
    (1266, "timetz", 12, "D", false, 0, 1270),
    (1560, "bit", -1, "V", false, 0, 1561),
    (1562, "varbit", -1, "V", false, 0, 1563),
    (1700, "numeric", -1, "N", false, 0, 1231),
    (1790, "refcursor", -1, "U", false, 0, 2201),
    (2202, "regprocedure", 4, "N", false, 0, 2207),
    (2203, "regoper", 4, "N", false, 0, 2208),
    (2204, "regoperator", 4, "N", false, 0, 2209),
    (2205, "regclass", 4, "N", false, 0, 2210),
    (2206, "regtype", 4, "N", false, 0, 2211),
    (2249, "record", -1, "P", false, 0, 2287),
    (2275, "cstring", -2, "P", false, 0, 1263),
    (2276, "any", 4, "P", false, 0, 0),
    (2277, "anyarray", -1, "P", false, 0, 0),
    (2278, "void", 4, "P", false, 0, 0),
    (2279, "trigger", 4, "P", false, 0, 0),
    (2281, "internal", 8, "P", false, 0, 0),
    (2283, "anyelement", 4, "P", false, 0, 0),
    (2776, "anynonarray", 4, "P", false, 0, 0),
    (2950, "uuid", 16, "U", false, 0, 2951),
    (2970, "txid_snapshot", -1, "U", false, 0, 2949),
    (3220, "pg_lsn", 8, "U", false, 0, 3221),
    (3500, "anyenum", 4, "P", false, 0, 0),
    (3614, "tsvector", -1, "U", false, 0, 3643),
    (3615, "tsquery", -1, "U", false, 0, 3645),
    (3734, "regconfig", 4, "N", false, 0, 3735),
    (3769, "regdictionary", 4, "N", false, 0, 3770),
    (3802, "jsonb", -1, "U", false, 0, 3807),
    (3831, "anyrange", -1, "P", false, 0, 0),
    (4072, "jsonpath", -1, "U", false, 0, 4073),
    (4089, "regnamespace", 4, "N", false, 0, 4090),
    (4096, "regrole", 4, "N", false, 0, 4097),
    (4191, "regcollation", 4, "N", false, 0, 4192),
    (5069, "xid8", 8, "U", false, 0, 271),
    // range types
    (3904, "int4range", -1, "R", false, 0, 3905),
    (3906, "numrange", -1, "R", false, 0, 3907),
    (3908, "tsrange", -1, "R", false, 0, 3909),
    (3910, "tstzrange", -1, "R", false, 0, 3911),
    (3912, "daterange", -1, "R", false, 0, 3913),
    (3926, "int8range", -1, "R", false, 0, 3927),
    (4451, "int4multirange", -1, "R", false, 0, 6150),
    (4532, "nummultirange", -1, "R", false, 0, 6151),
    (4533, "tsmultirange", -1, "R", false, 0, 6152),
    (4534, "tstzmultirange", -1, "R", false, 0, 6153),
    (4535, "datemultirange", -1, "R", false, 0, 6155),
    (4536, "int8multirange", -1, "R", false, 0, 6157),
    // array types
    (199, "_json", -1, "A", false, 114, 0),
    (143, "_xml", -1, "A", false, 142, 0),
    (271, "_xid8", -1, "A", false, 5069, 0),
    (629, "_line", -1, "A", false, 628, 0),
    (651, "_cidr", -1, "A", false, 650, 0),
    (719, "_circle", -1, "A", false, 718, 0),
    (775, "_macaddr8", -1, "A", false, 774, 0),
    (791, "_money", -1, "A", false, 790, 0),
    (1000, "_bool", -1, "A", false, 16, 0),
    (1001, "_bytea", -1, "A", false, 17, 0),
    (1002, "_char", -1, "A", false, 18, 0),
    (1003, "_name", -1, "A", false, 19, 0),
    (1005, "_int2", -1, "A", false, 21, 0),
    (1006, "_int2vector", -1, "A", false, 22, 0),
    (1007, "_int4", -1, "A", false, 23, 0),
    (1008, "_regproc", -1, "A", false, 24, 0),
    (1009, "_text", -1, "A", false, 25, 0),
    (1010, "_tid", -1, "A", false, 27, 0),
    (1011, "_xid", -1, "A", false, 28, 0),
    (1012, "_cid", -1, "A", false, 29, 0),
    (1013, "_oidvector", -1, "A", false, 30, 0),
    (1014, "_bpchar", -1, "A", false, 1042, 0),
    (1015, "_varchar", -1, "A", false, 1043, 0),
    (1016, "_int8", -1, "A", false, 20, 0),
    (1017, "_point", -1, "A", false, 600, 0),
    (1018, "_lseg", -1, "A", false, 601, 0),
    (1019, "_path", -1, "A", false, 602, 0),
    (1020, "_box", -1, "A", false, 603, 0),
    (1021, "_float4", -1, "A", false, 700, 0),
    (1022, "_float8", -1, "A", false, 701, 0),
    (1027, "_polygon", -1, "A", false, 604, 0),
    (1028, "_oid", -1, "A", false, 26, 0),
    (1034, "_aclitem", -1, "A", false, 1033, 0),
    (1040, "_macaddr", -1, "A", false, 829, 0),
    (1041, "_inet", -1, "A", false, 869, 0),
    (1115, "_timestamp", -1, "A", false, 1114, 0),
    (1182, "_date", -1, "A", false, 1082, 0),
    (1183, "_time", -1, "A", false, 1083, 0),
    (1185, "_timestamptz", -1, "A", false, 1184, 0),
    (1187, "_interval", -1, "A", false, 1186, 0),
    (1231, "_numeric", -1, "A", false, 1700, 0),
    (1263, "_cstring", -1, "A", false, 2275, 0),
    (1270, "_timetz", -1, "A", false, 1266, 0),
    (1561, "_bit", -1, "A", false, 1560, 0),
    (1563, "_varbit", -1, "A", false, 1562, 0),
    (2201, "_refcursor", -1, "A", false, 1790, 0),
    (2207, "_regprocedure", -1, "A", false, 2202, 0),
    (2208, "_regoper", -1, "A", false, 2203, 0),
    (2209, "_regoperator", -1, "A", false, 2204, 0),
    (2210, "_regclass", -1, "A", false, 2205, 0),
    (2211, "_regtype", -1, "A", false, 2206, 0),
    (2287, "_record", -1, "A", false, 2249, 0),
    (2949, "_txid_snapshot", -1, "A", false, 2970, 0),
    (2951, "_uuid", -1, "A", false, 2950, 0),
    (3221, "_pg_lsn", -1, "A", false, 3220, 0),
    (3643, "_tsvector", -1, "A", false, 3614, 0),
    (3645, "_tsquery", -1, "A", false, 3615, 0),
    (3735, "_regconfig", -1, "A", false, 3734, 0),
    (3770, "_regdictionary", -1, "A", false, 3769, 0),
    (3807, "_jsonb", -1, "A", false, 3802, 0),
    (3905, "_int4range", -1, "A", false, 3904, 0),
    (3907, "_numrange", -1, "A", false, 3906, 0),
    (3909, "_tsrange", -1, "A", false, 3908, 0),
    (3911, "_tstzrange", -1, "A", false, 3910, 0),
    (3913, "_daterange", -1, "A", false, 3912, 0),
    (3927, "_int8range", -1, "A", false, 3926, 0),
    (4073, "_jsonpath", -1, "A", false, 4072, 0),
    (4090, "_regnamespace", -1, "A", false, 4089, 0),
    (4097, "_regrole", -1, "A", false, 4096, 0),
    (4192, "_regcollation", -1, "A", false, 4191, 0),
    (6150, "_int4multirange", -1, "A", false, 4451, 0),
    (6151, "_nummultirange", -1, "A", false, 4532, 0),
    (6152, "_tsmultirange", -1, "A", false, 4533, 0),
    (6153, "_tstzmultirange", -1, "A", false, 4534, 0),
    (6155, "_datemultirange", -1, "A", false, 4535, 0),
    (6157, "_int8multirange", -1, "A", false, 4536, 0),
];
