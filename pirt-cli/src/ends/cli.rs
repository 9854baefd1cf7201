use clap::{arg, value_parser, ArgAction, Command};

pub const ENDS_CMD: &str = "ends";

pub fn create_ends_cli() -> Command {
    Command::new(ENDS_CMD)
        .about("Correlate 5' and 3' end offsets between long and short alignment pools")
        .arg_required_else_help(true)
        .arg(
            arg!(--pair <pair> "comma separated long,short BAM pair; a single file is used for both (may be repeated)")
                .action(ArgAction::Append)
                .required(true),
        )
        .arg(arg!(-o --out <name> "base name for the output file").required(true))
        .arg(
            arg!(--shortmin <length> "minimum length short read considered")
                .default_value("23")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--shortmax <length> "maximum length short read considered")
                .default_value("27")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--longmin <length> "minimum length long read considered")
                .default_value("28")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--longmax <length> "maximum length long read considered")
                .default_value("32")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            arg!(--minid <percent> "minimum percentage identity for read sequence bases")
                .default_value("90")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(--minq <quality> "minimum per-base sequence quality")
                .default_value("20")
                .value_parser(value_parser!(u8)),
        )
        .arg(
            arg!(--minavq <quality> "minimum average per-base sequence quality")
                .default_value("30")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(--mapq <quality> "minimum mapping quality, in [0, 254]")
                .default_value("0")
                .value_parser(value_parser!(u8)),
        )
        .arg(arg!(-f --filter <class> "piwi type filter: all, primary or secondary").default_value("all"))
        .arg(arg!(--strict "reject reads that also carry the complementary signature"))
        .arg(arg!(--careless "do not require short reads to satisfy the piwi filter"))
        .arg(arg!(--denest "remove long reads nested within another long read"))
        .arg(arg!(--contain "only consider long reads completely containing a short query"))
        .arg(arg!(--"ignore-clip-quality" "exclude soft-clipped base qualities from the quality sum"))
}
