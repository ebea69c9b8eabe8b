/// Two streams exchanging heat through a fixed-effectiveness exchanger
use flowscheme::{ConcurrencyMode, Element, EngineConfig, Port, Scheme, Value, ValueSpec, ValueStatus};
use log::info;

const CP: f64 = 4186.0;

fn stream(name: &str, status: ValueStatus) -> Result<Port, Box<dyn std::error::Error>> {
    let mut g = Value::new("G", ValueSpec::new("mass flow").with_dimension("kg/s"));
    let mut t = Value::new("T", ValueSpec::new("temperature").with_dimension("K"));
    g.update(None, Some(status))?;
    t.update(None, Some(status))?;
    Ok(Port::from_values(name, vec![g, t])?)
}

fn read(element: &Element, name: &str) -> Option<f64> {
    element.resolve(name)?.payload()?.as_f64()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Create a stream source
    fn supply(name: &str, g: f64, t: f64) -> Result<Element, Box<dyn std::error::Error>> {
        let element = Element::builder(name)
            .out_port(stream("Out", ValueStatus::Unknown)?)
            .parameter(Value::new("Gset", ValueSpec::new("mass flow")).with_initial(g, ValueStatus::Fixed)?)
            .parameter(Value::new("Tset", ValueSpec::new("temperature")).with_initial(t, ValueStatus::Fixed)?)
            .calculate(|element| {
                if let (Some(g), Some(t)) = (read(element, "Gset"), read(element, "Tset")) {
                    element.set("G_Out", g, ValueStatus::Calculated)?;
                    element.set("T_Out", t, ValueStatus::Calculated)?;
                }
                Ok(())
            })
            .build()?;
        Ok(element)
    }

    // Create the exchanger
    fn exchanger(name: &str, effectiveness: f64) -> Result<Element, Box<dyn std::error::Error>> {
        let element = Element::builder(name)
            .description("effectiveness-NTU exchanger with equal heat capacities")
            .in_port(stream("Hot", ValueStatus::Depend)?)
            .in_port(stream("Cold", ValueStatus::Depend)?)
            .out_port(stream("HotOut", ValueStatus::Unknown)?)
            .out_port(stream("ColdOut", ValueStatus::Unknown)?)
            .parameter(Value::new("Eps", ValueSpec::untyped()).with_initial(effectiveness, ValueStatus::Fixed)?)
            .internal_group(&["Hot", "HotOut"])
            .internal_group(&["Cold", "ColdOut"])
            .calculate(|element| {
                let hot = (read(element, "G_Hot"), read(element, "T_Hot"));
                let cold = (read(element, "G_Cold"), read(element, "T_Cold"));
                let (Some(gh), Some(th)) = hot else { return Ok(()) };
                let (Some(gc), Some(tc)) = cold else { return Ok(()) };
                let eps = read(element, "Eps").unwrap_or(1.0);

                let q = eps * (gh * CP).min(gc * CP) * (th - tc);
                element.set("G_HotOut", gh, ValueStatus::Calculated)?;
                element.set("T_HotOut", th - q / (gh * CP), ValueStatus::Calculated)?;
                element.set("G_ColdOut", gc, ValueStatus::Calculated)?;
                element.set("T_ColdOut", tc + q / (gc * CP), ValueStatus::Calculated)?;
                Ok(())
            })
            .build()?;
        Ok(element)
    }

    // Create a stream sink
    fn drain(name: &str) -> Result<Element, Box<dyn std::error::Error>> {
        Ok(Element::builder(name).in_port(stream("In", ValueStatus::Depend)?).build()?)
    }

    let config = EngineConfig::new().with_concurrency(ConcurrencyMode::Rayon);
    let mut scheme = Scheme::with_config("exchanger", config);

    let hot = scheme.add_element(supply("HotSupply", 1.5, 360.0)?)?;
    let cold = scheme.add_element(supply("ColdSupply", 2.0, 290.0)?)?;
    let hx = scheme.add_element(exchanger("HX", 0.75)?)?;
    let hot_drain = scheme.add_element(drain("HotDrain")?)?;
    let cold_drain = scheme.add_element(drain("ColdDrain")?)?;

    scheme.connect(hot, "Out", hx, "Hot")?;
    scheme.connect(cold, "Out", hx, "Cold")?;
    scheme.connect(hx, "HotOut", hot_drain, "In")?;
    scheme.connect(hx, "ColdOut", cold_drain, "In")?;

    println!("{}", scheme);

    let report = scheme.run()?;
    info!(
        "ran {} elements ({} pass-through) in {} sweep(s), {} edges updated",
        report.executed, report.skipped, report.sweeps, report.propagated
    );

    for id in [hot_drain, cold_drain] {
        if let Some(element) = scheme.element(id) {
            println!(
                "{}: G = {:.3} kg/s, T = {:.2} K",
                element.name(),
                read(element, "G_In").unwrap_or(f64::NAN),
                read(element, "T_In").unwrap_or(f64::NAN)
            );
        }
    }

    Ok(())
}
